//! Provider module
//!
//! Defines the Adaptor trait and one implementation per upstream protocol family

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod stream;

use crate::config::Settings;
use crate::models::openai::TextRequest;
use crate::models::Usage;
use crate::services::meta::{ApiType, RelayMeta};
use crate::services::usage::UsageEstimator;
use crate::utils::error::{ErrorContext, RelayError, RelayResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::response::Response;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Usage of a relayed response
#[derive(Debug)]
pub enum UsageHandle {
    /// Known as soon as the body has been read
    Ready(Usage),
    /// Resolves when the relayed stream ends
    Streaming(oneshot::Receiver<Usage>),
}

/// A response ready for the client plus its usage
pub struct RelayedResponse {
    pub response: Response,
    pub usage: UsageHandle,
}

/// Adaptor trait for upstream protocol families
///
/// An adaptor builds the upstream body from the canonical request, performs
/// the HTTP call and turns a successful upstream response into the client
/// response. Status classification is left to the caller.
#[async_trait]
pub trait Adaptor: Send + Sync {
    /// Get the adaptor name
    fn name(&self) -> &'static str;

    /// Build the upstream request body
    fn convert_request(&self, request: &TextRequest, meta: &RelayMeta) -> RelayResult<serde_json::Value>;

    /// Send the serialized body upstream
    async fn do_request(&self, body: Bytes, meta: &RelayMeta) -> RelayResult<reqwest::Response>;

    /// Relay a 200 upstream response and extract usage
    async fn do_response(&self, response: reqwest::Response, meta: &RelayMeta) -> RelayResult<RelayedResponse>;
}

/// Pair of HTTP clients: one for regular calls, one with the long stream timeout
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    stream_client: Client,
}

impl UpstreamClient {
    /// Create clients with custom timeouts
    pub fn with_timeouts(timeout_secs: u64, stream_timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("relaygate/0.1.0")
            .build()
            .context("Failed to create HTTP client")?;

        let stream_client = Client::builder()
            .timeout(Duration::from_secs(stream_timeout_secs))
            .user_agent("relaygate/0.1.0")
            .build()
            .context("Failed to create streaming HTTP client")?;

        Ok(Self { client, stream_client })
    }

    /// Start a JSON POST on the client matching the request's stream flag
    pub fn post(&self, url: &str, body: Bytes, is_stream: bool) -> reqwest::RequestBuilder {
        let client = if is_stream { &self.stream_client } else { &self.client };
        let builder = client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body);
        if is_stream {
            builder.header("Accept", "text/event-stream")
        } else {
            builder
        }
    }

    /// Send a prepared request, mapping failures to transport errors
    pub async fn send(&self, builder: reqwest::RequestBuilder) -> RelayResult<reqwest::Response> {
        let response = builder.send().await.transport_context("Failed to send request")?;
        debug!("Upstream answered {}", response.status());
        Ok(response)
    }
}

/// Read a whole upstream body
pub(crate) async fn read_body(response: reqwest::Response) -> RelayResult<Bytes> {
    response.bytes().await.parse_context("Failed to read response body")
}

/// Registry of adaptors keyed by API type
#[derive(Default, Clone)]
pub struct AdaptorRegistry {
    adaptors: HashMap<ApiType, Arc<dyn Adaptor>>,
}

impl AdaptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adaptor sharing one client pair and estimator
    pub fn with_defaults(settings: &Settings, estimator: UsageEstimator) -> Result<Self> {
        let http = UpstreamClient::with_timeouts(settings.upstream.timeout, settings.upstream.stream_timeout)?;

        let mut registry = Self::new();
        registry.register(ApiType::OpenAI, Arc::new(openai::OpenAIAdaptor::new(http.clone(), estimator.clone())));
        registry.register(ApiType::Anthropic, Arc::new(anthropic::AnthropicAdaptor::new(http.clone(), estimator.clone())));
        registry.register(ApiType::Gemini, Arc::new(gemini::GeminiAdaptor::new(http, estimator)));
        Ok(registry)
    }

    pub fn register(&mut self, api_type: ApiType, adaptor: Arc<dyn Adaptor>) {
        debug!("Registering adaptor {} for {}", adaptor.name(), api_type);
        self.adaptors.insert(api_type, adaptor);
    }

    /// Look up the adaptor for an API type
    pub fn get(&self, api_type: ApiType) -> RelayResult<Arc<dyn Adaptor>> {
        self.adaptors
            .get(&api_type)
            .cloned()
            .ok_or_else(|| RelayError::InvalidApiType(format!("no adaptor registered for api type {}", api_type)))
    }
}

pub use anthropic::AnthropicAdaptor;
pub use gemini::GeminiAdaptor;
pub use openai::OpenAIAdaptor;
