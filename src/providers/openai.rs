//! OpenAI adaptor implementation
//!
//! Native protocol: OpenAI, Azure OpenAI and OpenAI-compatible channels

use super::stream::{relay_stream, StreamTranslator, DONE};
use super::{read_body, Adaptor, RelayedResponse, UpstreamClient, UsageHandle};
use crate::models::openai::{OpenAIContent, TextRequest};
use crate::models::Usage;
use crate::services::meta::{ChannelType, RelayMeta, RelayMode};
use crate::services::usage::UsageEstimator;
use crate::utils::error::{ErrorBody, RelayError, RelayResult};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, warn};

/// OpenAI adaptor
pub struct OpenAIAdaptor {
    http: UpstreamClient,
    estimator: UsageEstimator,
}

impl OpenAIAdaptor {
    pub fn new(http: UpstreamClient, estimator: UsageEstimator) -> Self {
        Self { http, estimator }
    }

    /// Build the request URL
    pub fn build_url(meta: &RelayMeta) -> RelayResult<String> {
        if meta.channel_type == ChannelType::Azure {
            let (Some(deployment), Some(version)) = (&meta.deployment_name, &meta.api_version) else {
                return Err(RelayError::ConfigNotFound {
                    code: "deployment_config_not_found",
                    message: format!("deployment config for {} not found", meta.actual_model),
                });
            };
            return Ok(format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                meta.base_url,
                deployment,
                meta.mode.azure_task(),
                version
            ));
        }
        Ok(format!("{}{}", meta.base_url, meta.mode.path()))
    }
}

/// Just enough of a completion/embedding body to find usage and text
#[derive(Debug, Default, Deserialize)]
struct ResponseProbe {
    #[serde(default)]
    choices: Vec<ChoiceProbe>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceProbe {
    #[serde(default)]
    message: Option<MessageProbe>,
    #[serde(default)]
    delta: Option<MessageProbe>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageProbe {
    #[serde(default)]
    content: Option<OpenAIContent>,
}

impl ChoiceProbe {
    fn text(&self) -> String {
        let message = self.message.as_ref().or(self.delta.as_ref());
        match (message.and_then(|m| m.content.as_ref()), &self.text) {
            (Some(content), _) => content.extract_text(),
            (None, Some(text)) => text.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Usage for a non-streamed body, recomputed when the upstream reports none
fn resolve_usage(
    reported: Option<Usage>,
    text: impl FnOnce() -> String,
    estimator: &UsageEstimator,
    meta: &RelayMeta,
) -> Usage {
    match reported {
        Some(usage) if usage.total_tokens != 0 => usage.normalized(),
        _ => match meta.mode {
            RelayMode::Embeddings => Usage::prompt_only(meta.prompt_tokens),
            _ => estimator.usage_from_text(&text(), &meta.actual_model, meta.prompt_tokens),
        },
    }
}

/// Forwards payloads verbatim while collecting completion text
struct PassthroughTranslator {
    estimator: UsageEstimator,
    model: String,
    prompt_tokens: u32,
    text: String,
    reported: Option<Usage>,
}

impl StreamTranslator for PassthroughTranslator {
    fn on_payload(&mut self, payload: &str) -> Vec<String> {
        if payload.trim() != DONE {
            match serde_json::from_str::<ResponseProbe>(payload) {
                Ok(chunk) => {
                    for choice in &chunk.choices {
                        self.text.push_str(&choice.text());
                    }
                    if let Some(usage) = chunk.usage.filter(|u| !u.is_empty()) {
                        self.reported = Some(usage.normalized());
                    }
                }
                Err(e) => warn!("Failed to parse streaming response chunk: {}", e),
            }
        }
        vec![payload.to_string()]
    }

    fn usage(&self) -> Usage {
        self.reported
            .unwrap_or_else(|| self.estimator.usage_from_text(&self.text, &self.model, self.prompt_tokens))
    }
}

#[async_trait]
impl Adaptor for OpenAIAdaptor {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn convert_request(&self, request: &TextRequest, meta: &RelayMeta) -> RelayResult<serde_json::Value> {
        let mut request = request.clone();
        if meta.channel_type.requires_body_normalization() && request.frequency_penalty == Some(0.0) {
            debug!("Dropping zero frequency_penalty for {:?} channel", meta.channel_type);
            request.frequency_penalty = None;
        }
        Ok(serde_json::to_value(&request)?)
    }

    async fn do_request(&self, body: Bytes, meta: &RelayMeta) -> RelayResult<reqwest::Response> {
        let url = Self::build_url(meta)?;
        debug!("Sending OpenAI request to {}", url);

        let builder = self.http.post(&url, body, meta.is_stream);
        let builder = if meta.channel_type == ChannelType::Azure {
            builder.header("api-key", &meta.api_key)
        } else {
            builder.header("Authorization", format!("Bearer {}", meta.api_key))
        };

        self.http.send(builder).await
    }

    async fn do_response(&self, response: reqwest::Response, meta: &RelayMeta) -> RelayResult<RelayedResponse> {
        if meta.is_stream {
            let translator = PassthroughTranslator {
                estimator: self.estimator.clone(),
                model: meta.actual_model.clone(),
                prompt_tokens: meta.prompt_tokens,
                text: String::new(),
                reported: None,
            };
            return Ok(relay_stream(response, translator));
        }

        let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = read_body(response).await?;

        let probe: ResponseProbe = serde_json::from_slice(&body)
            .map_err(|e| RelayError::ResponseParseFailed(format!("Failed to parse OpenAI response: {}", e)))?;

        if let Some(error) = probe.error.as_ref().filter(|e| !e.message.is_empty() || !e.error_type.is_empty()) {
            warn!("Upstream returned an error object with status {}: {}", status, error.message);
            return Err(RelayError::from_upstream(StatusCode::INTERNAL_SERVER_ERROR, &body));
        }

        let usage = resolve_usage(
            probe.usage,
            || probe.choices.iter().map(ChoiceProbe::text).collect::<Vec<_>>().join(""),
            &self.estimator,
            meta,
        );

        let response = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .map_err(|e| RelayError::ResponseParseFailed(format!("Failed to build response: {}", e)))?;

        Ok(RelayedResponse {
            response,
            usage: UsageHandle::Ready(usage),
        })
    }
}
