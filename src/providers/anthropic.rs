//! Anthropic Messages adaptor
//!
//! Converts canonical chat requests to the Messages API and re-frames
//! responses (and stream events) into the OpenAI chat-completion shape.

use super::stream::{chat_chunk, relay_stream, unix_now, StreamTranslator, DONE};
use super::{read_body, Adaptor, RelayedResponse, UpstreamClient, UsageHandle};
use crate::models::claude::*;
use crate::models::openai::{
    OpenAIChoice, OpenAIContent, OpenAIContentPart, OpenAIMessage, OpenAIResponse, OpenAIStreamDelta, TextRequest,
};
use crate::models::Usage;
use crate::services::meta::{RelayMeta, RelayMode};
use crate::services::usage::UsageEstimator;
use crate::utils::error::{RelayError, RelayResult};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic adaptor
pub struct AnthropicAdaptor {
    http: UpstreamClient,
    estimator: UsageEstimator,
}

impl AnthropicAdaptor {
    pub fn new(http: UpstreamClient, estimator: UsageEstimator) -> Self {
        Self { http, estimator }
    }

    /// Build the request URL
    fn build_url(meta: &RelayMeta) -> String {
        format!("{}/v1/messages", meta.base_url)
    }
}

/// Convert a canonical chat request into a Messages API request
pub fn convert_chat_request(request: &TextRequest, meta: &RelayMeta) -> RelayResult<ClaudeRequest> {
    if meta.mode != RelayMode::ChatCompletions {
        return Err(RelayError::ConversionFailed(format!(
            "anthropic channels only support chat completions, got {:?}",
            meta.mode
        )));
    }

    let mut system_parts = Vec::new();
    let mut messages = Vec::new();

    for message in &request.messages {
        match message.role.as_str() {
            "system" => system_parts.push(message.text()),
            role => {
                let role = if role == "assistant" { "assistant" } else { "user" };
                messages.push(ClaudeMessage {
                    role: role.to_string(),
                    content: convert_content(message),
                });
            }
        }
    }

    if messages.is_empty() {
        return Err(RelayError::ConversionFailed("no user or assistant messages to send".to_string()));
    }

    Ok(ClaudeRequest {
        model: meta.actual_model.clone(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        system: if system_parts.is_empty() { None } else { Some(system_parts.join("\n")) },
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop.as_ref().map(|s| s.to_vec()),
        stream: if meta.is_stream { Some(true) } else { None },
    })
}

fn convert_content(message: &OpenAIMessage) -> ClaudeContent {
    match &message.content {
        Some(OpenAIContent::Array(parts)) => ClaudeContent::Blocks(
            parts
                .iter()
                .filter_map(|part| match part {
                    OpenAIContentPart::ImageUrl { image_url } => {
                        let source = match image_url.as_inline_data() {
                            Some((media_type, data)) => ClaudeImageSource {
                                source_type: "base64".to_string(),
                                media_type: Some(media_type.to_string()),
                                data: Some(data.to_string()),
                                url: None,
                            },
                            None => ClaudeImageSource {
                                source_type: "url".to_string(),
                                media_type: None,
                                data: None,
                                url: Some(image_url.url.clone()),
                            },
                        };
                        Some(ClaudeContentBlock::Image { source })
                    }
                    other => other.as_text().map(|text| ClaudeContentBlock::Text { text: text.to_string() }),
                })
                .collect(),
        ),
        _ => ClaudeContent::Text(message.text()),
    }
}

/// Re-frame a Messages API response as an OpenAI chat completion
pub fn convert_response(response: ClaudeResponse, usage: Usage) -> OpenAIResponse {
    OpenAIResponse {
        id: response.id,
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: response.model,
        choices: vec![OpenAIChoice {
            index: 0,
            message: OpenAIMessage {
                role: "assistant".to_string(),
                content: Some(OpenAIContent::Text(extract_block_text(&response.content))),
                ..Default::default()
            },
            finish_reason: stop_reason_to_finish_reason(response.stop_reason.as_deref()),
        }],
        usage,
    }
}

/// Re-frames Messages API stream events as OpenAI chunks
struct ClaudeStreamTranslator {
    estimator: UsageEstimator,
    model: String,
    prompt_tokens: u32,
    id: String,
    created: u64,
    text: String,
    input_tokens: u32,
    output_tokens: u32,
}

impl ClaudeStreamTranslator {
    fn new(estimator: UsageEstimator, meta: &RelayMeta) -> Self {
        Self {
            estimator,
            model: meta.actual_model.clone(),
            prompt_tokens: meta.prompt_tokens,
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: unix_now(),
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    fn chunk(&self, delta: OpenAIStreamDelta, finish_reason: Option<String>) -> String {
        chat_chunk(&self.id, self.created, &self.model, delta, finish_reason)
    }
}

impl StreamTranslator for ClaudeStreamTranslator {
    fn on_payload(&mut self, payload: &str) -> Vec<String> {
        let event = match serde_json::from_str::<ClaudeStreamEvent>(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to parse Anthropic stream event: {}", e);
                return Vec::new();
            }
        };

        match event {
            ClaudeStreamEvent::MessageStart { message } => {
                if !message.id.is_empty() {
                    self.id = message.id;
                }
                self.input_tokens = message.usage.input_tokens;
                self.output_tokens = self.output_tokens.max(message.usage.output_tokens);
                let delta = OpenAIStreamDelta { role: Some("assistant".to_string()), content: None };
                vec![self.chunk(delta, None)]
            }
            ClaudeStreamEvent::ContentBlockDelta { delta: ClaudeContentDelta::TextDelta { text }, .. } => {
                self.text.push_str(&text);
                let delta = OpenAIStreamDelta { role: None, content: Some(text) };
                vec![self.chunk(delta, None)]
            }
            ClaudeStreamEvent::MessageDelta { delta, usage } => {
                self.output_tokens = self.output_tokens.max(usage.output_tokens);
                if usage.input_tokens > 0 {
                    self.input_tokens = usage.input_tokens;
                }
                match stop_reason_to_finish_reason(delta.stop_reason.as_deref()) {
                    Some(reason) => vec![self.chunk(OpenAIStreamDelta::default(), Some(reason))],
                    None => Vec::new(),
                }
            }
            ClaudeStreamEvent::Error { error } => {
                warn!("Anthropic stream error: {} - {}", error.error_type, error.message);
                let body = serde_json::json!({
                    "error": {"message": error.message, "type": error.error_type, "code": "upstream_stream_error"}
                });
                vec![body.to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<String> {
        vec![DONE.to_string()]
    }

    fn usage(&self) -> Usage {
        let prompt = if self.input_tokens > 0 { self.input_tokens } else { self.prompt_tokens };
        let completion = if self.output_tokens > 0 {
            self.output_tokens
        } else {
            self.estimator.count_text(&self.text, &self.model)
        };
        Usage::new(prompt, completion)
    }
}

#[async_trait]
impl Adaptor for AnthropicAdaptor {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn convert_request(&self, request: &TextRequest, meta: &RelayMeta) -> RelayResult<serde_json::Value> {
        let converted = convert_chat_request(request, meta)?;
        Ok(serde_json::to_value(&converted)?)
    }

    async fn do_request(&self, body: Bytes, meta: &RelayMeta) -> RelayResult<reqwest::Response> {
        let url = Self::build_url(meta);
        debug!("Sending Anthropic request to {}", url);

        let builder = self
            .http
            .post(&url, body, meta.is_stream)
            .header("x-api-key", &meta.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        self.http.send(builder).await
    }

    async fn do_response(&self, response: reqwest::Response, meta: &RelayMeta) -> RelayResult<RelayedResponse> {
        if meta.is_stream {
            let translator = ClaudeStreamTranslator::new(self.estimator.clone(), meta);
            return Ok(relay_stream(response, translator));
        }

        let body = read_body(response).await?;
        let claude: ClaudeResponse = serde_json::from_slice(&body)
            .map_err(|e| RelayError::ResponseParseFailed(format!("Failed to parse Anthropic response: {}", e)))?;

        let usage = if claude.usage.input_tokens == 0 && claude.usage.output_tokens == 0 {
            self.estimator
                .usage_from_text(&extract_block_text(&claude.content), &meta.actual_model, meta.prompt_tokens)
        } else {
            Usage::new(claude.usage.input_tokens, claude.usage.output_tokens)
        };

        let converted = convert_response(claude, usage);
        Ok(RelayedResponse {
            response: Json(converted).into_response(),
            usage: UsageHandle::Ready(usage),
        })
    }
}
