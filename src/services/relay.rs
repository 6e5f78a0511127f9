//! Relay orchestrator
//!
//! Drives one text request through validation, model resolution, quota
//! reservation, upstream dispatch and settlement. Any failure after the
//! reservation refunds it before the error is returned.

use crate::config::ChannelConfig;
use crate::models::openai::TextRequest;
use crate::models::Usage;
use crate::providers::{Adaptor, AdaptorRegistry, RelayedResponse, UsageHandle};
use crate::services::meta::{ApiType, RelayMeta, RelayMode, TokenContext};
use crate::services::model_mapper::{map_model, resolve_deployment};
use crate::services::quota::{PricingRatio, QuotaAccountant, Reservation, SettlementJob};
use crate::services::settlement::SettlementQueue;
use crate::services::usage::UsageEstimator;
use crate::utils::error::{ErrorContext, RelayError, RelayResult};
use crate::utils::logging::create_request_log_summary;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, warn};

/// Relay orchestrator for a single upstream channel
pub struct Relay {
    channel: ChannelConfig,
    registry: AdaptorRegistry,
    estimator: UsageEstimator,
    accountant: Arc<QuotaAccountant>,
    settlement: Arc<SettlementQueue>,
}

impl Relay {
    pub fn new(
        channel: ChannelConfig,
        registry: AdaptorRegistry,
        estimator: UsageEstimator,
        accountant: Arc<QuotaAccountant>,
        settlement: Arc<SettlementQueue>,
    ) -> Self {
        Self {
            channel,
            registry,
            estimator,
            accountant,
            settlement,
        }
    }

    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    /// Relay one text request end to end
    pub async fn relay_text(&self, token: &TokenContext, mode: RelayMode, body: Bytes) -> RelayResult<Response> {
        // Validation
        let mut request: TextRequest = serde_json::from_slice(&body).invalid_request_context("Failed to parse request body")?;
        validate_text_request(&request, mode).map_err(RelayError::InvalidRequest)?;

        if let Ok(summary) = serde_json::to_string_pretty(&create_request_log_summary(&request)) {
            debug!("Client request:\n{}", summary);
        }

        // Meta resolution
        let mut meta = RelayMeta::new(&self.channel, token, mode);
        meta.is_stream = request.stream;
        meta.origin_model = request.model.clone();
        let adaptor = self.registry.get(meta.api_type)?;

        if meta.channel_type.requires_deployment() {
            let deployment = resolve_deployment(self.channel.config_json().as_deref(), &meta.origin_model)?;
            meta.deployment_name = Some(deployment.deployment_name);
            meta.api_version = Some(deployment.api_version);
        }

        // Model mapping, pricing, estimation
        let (actual_model, is_mapped) = map_model(&request.model, &meta.model_mapping);
        request.model = actual_model.clone();
        meta.actual_model = actual_model;

        let pricing = self.accountant.pricing(&meta.actual_model, &meta.group)?;
        meta.prompt_tokens = self.estimator.estimate_prompt_tokens(&request, mode);

        let reservation = self
            .accountant
            .pre_consume(&meta.token_id, meta.prompt_tokens, &pricing)
            .await?;

        // Dispatch and classification; the only refund point
        let relayed = match self.dispatch(adaptor.as_ref(), &request, &mut meta, body, is_mapped).await {
            Ok(relayed) => relayed,
            Err(e) => {
                warn!("Relay via {} failed after reservation: {}", adaptor.name(), e);
                self.accountant.refund(reservation).await;
                return Err(e);
            }
        };

        self.settle(reservation, relayed.usage, pricing, &meta);
        Ok(relayed.response)
    }

    async fn dispatch(
        &self,
        adaptor: &dyn Adaptor,
        request: &TextRequest,
        meta: &mut RelayMeta,
        raw_body: Bytes,
        is_mapped: bool,
    ) -> RelayResult<RelayedResponse> {
        let body = build_request_body(adaptor, request, meta, raw_body, is_mapped)?;

        let response = adaptor.do_request(body, meta).await?;

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);
        meta.is_stream = meta.is_stream || is_event_stream;

        if response.status() != reqwest::StatusCode::OK {
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let body = response.bytes().await.unwrap_or_default();
            return Err(RelayError::from_upstream(status, &body));
        }

        adaptor.do_response(response, meta).await
    }

    fn settle(&self, reservation: Reservation, usage: UsageHandle, pricing: PricingRatio, meta: &RelayMeta) {
        let estimated = meta.prompt_tokens;
        let channel_id = meta.channel_id;
        let origin_model = meta.origin_model.clone();
        let actual_model = meta.actual_model.clone();
        let is_stream = meta.is_stream;

        let build = move |usage: Usage| SettlementJob {
            reservation,
            usage: if usage.is_empty() { Usage::prompt_only(estimated) } else { usage },
            pricing,
            channel_id,
            origin_model,
            actual_model,
            is_stream,
            estimated_prompt_tokens: estimated,
        };

        match usage {
            UsageHandle::Ready(usage) => self.settlement.submit(build(usage)),
            UsageHandle::Streaming(rx) => self.settlement.submit_when_ready(rx, build),
        }
    }
}

/// Serialize the upstream body
///
/// Native requests pass the client's bytes through untouched unless the model
/// was rewritten or the channel needs normalized field values.
fn build_request_body(
    adaptor: &dyn Adaptor,
    request: &TextRequest,
    meta: &RelayMeta,
    raw_body: Bytes,
    is_mapped: bool,
) -> RelayResult<Bytes> {
    if meta.api_type == ApiType::OpenAI && !is_mapped && !meta.channel_type.requires_body_normalization() {
        return Ok(raw_body);
    }
    let converted = adaptor.convert_request(request, meta)?;
    Ok(Bytes::from(serde_json::to_vec(&converted)?))
}

/// Validate a text request for the given mode
pub fn validate_text_request(request: &TextRequest, mode: RelayMode) -> Result<(), String> {
    if request.model.is_empty() {
        return Err("model is required".to_string());
    }

    match mode {
        RelayMode::ChatCompletions => {
            if request.messages.is_empty() {
                return Err("field messages is required".to_string());
            }
            for (i, message) in request.messages.iter().enumerate() {
                if message.role.is_empty() {
                    return Err(format!("message {} role cannot be empty", i));
                }
            }
        }
        RelayMode::Completions => {
            if request.prompt.as_ref().map_or(true, |p| p.is_null()) {
                return Err("field prompt is required".to_string());
            }
        }
        RelayMode::Embeddings => {
            if request.input.as_ref().map_or(true, |i| i.is_null()) {
                return Err("field input is required".to_string());
            }
        }
    }

    if let Some(temp) = request.temperature {
        if !(0.0..=2.0).contains(&temp) {
            return Err("temperature must be between 0.0 and 2.0".to_string());
        }
    }

    if let Some(top_p) = request.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err("top_p must be between 0.0 and 1.0".to_string());
        }
    }

    if request.max_tokens == Some(0) {
        return Err("max_tokens must be greater than 0".to_string());
    }

    Ok(())
}
