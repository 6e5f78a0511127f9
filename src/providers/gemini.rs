//! Gemini adaptor implementation

use super::stream::{chat_chunk, relay_stream, unix_now, StreamTranslator, DONE};
use super::{read_body, Adaptor, RelayedResponse, UpstreamClient, UsageHandle};
use crate::models::gemini::*;
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

/// Gemini adaptor
pub struct GeminiAdaptor {
    http: UpstreamClient,
    estimator: UsageEstimator,
}

impl GeminiAdaptor {
    pub fn new(http: UpstreamClient, estimator: UsageEstimator) -> Self {
        Self { http, estimator }
    }

    /// Build the request URL
    pub fn build_url(meta: &RelayMeta) -> String {
        if meta.is_stream {
            format!("{}/v1beta/models/{}:streamGenerateContent?alt=sse", meta.base_url, meta.actual_model)
        } else {
            format!("{}/v1beta/models/{}:generateContent", meta.base_url, meta.actual_model)
        }
    }
}

/// Convert a canonical chat request into a Gemini request
pub fn convert_chat_request(request: &TextRequest, meta: &RelayMeta) -> RelayResult<GeminiRequest> {
    if meta.mode != RelayMode::ChatCompletions {
        return Err(RelayError::ConversionFailed(format!(
            "gemini channels only support chat completions, got {:?}",
            meta.mode
        )));
    }

    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        if message.role == "system" {
            system_parts.push(GeminiPart::Text { text: message.text() });
            continue;
        }
        let role = if message.role == "assistant" { "model" } else { "user" };
        contents.push(GeminiContent {
            role: role.to_string(),
            parts: convert_parts(message),
        });
    }

    let tools = request.tools.as_ref().filter(|tools| !tools.is_empty()).map(|tools| {
        vec![GeminiTool {
            function_declarations: tools
                .iter()
                .map(|tool| GeminiFunctionDeclaration {
                    name: tool.function.name.clone(),
                    description: tool.function.description.clone().unwrap_or_default(),
                    parameters: tool.function.parameters.clone(),
                })
                .collect(),
        }]
    });

    let generation_config = GeminiGenerationConfig {
        temperature: request.temperature,
        top_p: request.top_p,
        max_output_tokens: request.max_tokens,
        stop_sequences: request.stop.as_ref().map(|s| s.to_vec()),
        candidate_count: request.n,
    };

    Ok(GeminiRequest {
        contents,
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(GeminiContent { role: String::new(), parts: system_parts })
        },
        tools,
        generation_config: Some(generation_config),
    })
}

fn convert_parts(message: &OpenAIMessage) -> Vec<GeminiPart> {
    match &message.content {
        Some(OpenAIContent::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                OpenAIContentPart::ImageUrl { image_url } => match image_url.as_inline_data() {
                    Some((mime_type, data)) => Some(GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: mime_type.to_string(),
                            data: data.to_string(),
                        },
                    }),
                    None => {
                        debug!("Skipping remote image URL; Gemini needs inline data");
                        None
                    }
                },
                other => other.as_text().map(|text| GeminiPart::Text { text: text.to_string() }),
            })
            .collect(),
        _ => vec![GeminiPart::Text { text: message.text() }],
    }
}

fn usage_from_metadata(metadata: Option<GeminiUsageMetadata>) -> Option<Usage> {
    let metadata = metadata?;
    let prompt = metadata.prompt_token_count.unwrap_or(0);
    let completion = metadata.candidates_token_count.unwrap_or(0);
    if prompt == 0 && completion == 0 {
        None
    } else {
        Some(Usage::new(prompt, completion))
    }
}

/// Re-frame a Gemini response as an OpenAI chat completion
pub fn convert_response(response: &GeminiResponse, model: &str, usage: Usage) -> OpenAIResponse {
    let choices = response
        .candidates
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, candidate)| OpenAIChoice {
            index: candidate.index.unwrap_or(i as u32),
            message: OpenAIMessage {
                role: "assistant".to_string(),
                content: Some(OpenAIContent::Text(candidate.text())),
                ..Default::default()
            },
            finish_reason: finish_reason_to_openai(candidate.finish_reason.as_deref()),
        })
        .collect();

    OpenAIResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices,
        usage,
    }
}

/// Re-frames Gemini stream chunks as OpenAI chunks
struct GeminiStreamTranslator {
    estimator: UsageEstimator,
    model: String,
    prompt_tokens: u32,
    id: String,
    created: u64,
    text: String,
    reported: Option<Usage>,
}

impl StreamTranslator for GeminiStreamTranslator {
    fn on_payload(&mut self, payload: &str) -> Vec<String> {
        let chunk = match serde_json::from_str::<GeminiResponse>(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Failed to parse Gemini stream chunk: {}", e);
                return Vec::new();
            }
        };

        if let Some(usage) = usage_from_metadata(chunk.usage_metadata) {
            self.reported = Some(usage);
        }

        let mut out = Vec::new();
        for candidate in chunk.candidates.as_deref().unwrap_or_default() {
            let text = candidate.text();
            self.text.push_str(&text);
            let delta = OpenAIStreamDelta {
                role: None,
                content: if text.is_empty() { None } else { Some(text) },
            };
            let finish_reason = finish_reason_to_openai(candidate.finish_reason.as_deref());
            if delta.content.is_some() || finish_reason.is_some() {
                out.push(chat_chunk(&self.id, self.created, &self.model, delta, finish_reason));
            }
        }
        out
    }

    fn finish(&mut self) -> Vec<String> {
        vec![DONE.to_string()]
    }

    fn usage(&self) -> Usage {
        self.reported
            .unwrap_or_else(|| self.estimator.usage_from_text(&self.text, &self.model, self.prompt_tokens))
    }
}

#[async_trait]
impl Adaptor for GeminiAdaptor {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn convert_request(&self, request: &TextRequest, meta: &RelayMeta) -> RelayResult<serde_json::Value> {
        let converted = convert_chat_request(request, meta)?;
        Ok(serde_json::to_value(&converted)?)
    }

    async fn do_request(&self, body: Bytes, meta: &RelayMeta) -> RelayResult<reqwest::Response> {
        let url = Self::build_url(meta);
        debug!("Sending Gemini request to {}", url);

        let builder = self
            .http
            .post(&url, body, meta.is_stream)
            .header("x-goog-api-key", &meta.api_key);

        self.http.send(builder).await
    }

    async fn do_response(&self, response: reqwest::Response, meta: &RelayMeta) -> RelayResult<RelayedResponse> {
        if meta.is_stream {
            let translator = GeminiStreamTranslator {
                estimator: self.estimator.clone(),
                model: meta.actual_model.clone(),
                prompt_tokens: meta.prompt_tokens,
                id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
                created: unix_now(),
                text: String::new(),
                reported: None,
            };
            return Ok(relay_stream(response, translator));
        }

        let body = read_body(response).await?;
        let gemini: GeminiResponse = serde_json::from_slice(&body)
            .map_err(|e| RelayError::ResponseParseFailed(format!("Failed to parse Gemini response: {}", e)))?;

        let usage = usage_from_metadata(gemini.usage_metadata).unwrap_or_else(|| {
            let text: String = gemini
                .candidates
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(GeminiCandidate::text)
                .collect();
            self.estimator.usage_from_text(&text, &meta.actual_model, meta.prompt_tokens)
        });

        let converted = convert_response(&gemini, &meta.actual_model, usage);
        Ok(RelayedResponse {
            response: Json(converted).into_response(),
            usage: UsageHandle::Ready(usage),
        })
    }
}
