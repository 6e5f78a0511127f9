//! OpenAI API data models
//!
//! The OpenAI chat/completions/embeddings shape doubles as the canonical,
//! provider-agnostic request every adaptor starts from.

use super::Usage;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Canonical text-generation request
///
/// Fields the gateway does not interpret are preserved in `extra` so a
/// re-serialized body still carries everything the client sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextRequest {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Message list (chat mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<OpenAIMessage>,
    /// Prompt (completions mode): a string or an array of strings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<serde_json::Value>,
    /// Input (embeddings mode): a string or an array of strings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    /// Whether to stream response
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    /// Maximum tokens to generate (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature parameter (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p parameter (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Number of generations (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Stop sequences (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    /// Presence penalty (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Frequency penalty (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// User identifier (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Tools (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAITool>>,
    /// Tool choice (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Everything else the client sent
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Stop sequences: OpenAI accepts a bare string or a list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StopSequences {
    Single(String),
    Multiple(Vec<String>),
}

impl StopSequences {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StopSequences::Single(s) => vec![s.clone()],
            StopSequences::Multiple(v) => v.clone(),
        }
    }
}

/// OpenAI message structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role (system/user/assistant/tool)
    pub role: String,
    /// Message content
    #[serde(default)]
    pub content: Option<OpenAIContent>,
    /// Name (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    /// Tool call ID (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Other message fields (`function_call`, `audio`, `refusal`, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// OpenAI message content (can be string or content array)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    /// Simple text content
    Text(String),
    /// Content array (supports multimodal)
    Array(Vec<OpenAIContentPart>),
}

/// OpenAI content part
///
/// Part types the gateway does not interpret (`input_audio`, `file`,
/// `refusal`, ...) are kept as raw JSON in `Other` and written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenAIContentPart {
    /// Text part
    Text { text: String },
    /// Image URL part
    ImageUrl { image_url: OpenAIImageUrl },
    /// Any other part, verbatim
    Other(Value),
}

impl OpenAIContentPart {
    /// Text carried by the part, including `text` parts with extra keys
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OpenAIContentPart::Text { text } => Some(text),
            OpenAIContentPart::Other(value) if value.get("type").and_then(Value::as_str) == Some("text") => {
                value.get("text").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    fn from_value(value: Value) -> Self {
        Self::known_part(&value).unwrap_or(OpenAIContentPart::Other(value))
    }

    /// Only exact known shapes are taken apart; anything richer stays raw
    fn known_part(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.len() != 2 {
            return None;
        }
        match object.get("type")?.as_str()? {
            "text" => {
                let text = object.get("text")?.as_str()?;
                Some(OpenAIContentPart::Text { text: text.to_string() })
            }
            "image_url" => {
                let image_url = serde_json::from_value(object.get("image_url")?.clone()).ok()?;
                Some(OpenAIContentPart::ImageUrl { image_url })
            }
            _ => None,
        }
    }
}

impl Serialize for OpenAIContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OpenAIContentPart::Text { text } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
                map.end()
            }
            OpenAIContentPart::ImageUrl { image_url } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", image_url)?;
                map.end()
            }
            OpenAIContentPart::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OpenAIContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(OpenAIContentPart::from_value)
    }
}

/// OpenAI image URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIImageUrl {
    /// Image URL
    pub url: String,
    /// Detail level (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OpenAI tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAITool {
    /// Tool type
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: OpenAIFunction,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// OpenAI function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    /// Function name
    pub name: String,
    /// Function description (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameter schema (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Other function fields such as `strict`
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// OpenAI tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    /// Call ID
    #[serde(default)]
    pub id: String,
    /// Tool type
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    /// Function call
    pub function: OpenAIFunctionCall,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_tool_type() -> String {
    "function".to_string()
}

/// OpenAI function call structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    /// Function name (optional for streaming)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments as JSON string (optional for streaming)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// OpenAI chat completion response
///
/// Used when re-framing non-OpenAI upstream responses for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIResponse {
    /// Response ID
    pub id: String,
    /// Object type
    pub object: String,
    /// Creation timestamp
    pub created: u64,
    /// Model used
    pub model: String,
    /// Choice list
    pub choices: Vec<OpenAIChoice>,
    /// Usage statistics
    pub usage: Usage,
}

/// OpenAI choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIChoice {
    /// Choice index
    pub index: u32,
    /// Message content
    pub message: OpenAIMessage,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// OpenAI streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIStreamResponse {
    /// Response ID
    pub id: String,
    /// Object type
    pub object: String,
    /// Creation timestamp
    pub created: u64,
    /// Model used
    pub model: String,
    /// Choice list
    pub choices: Vec<OpenAIStreamChoice>,
    /// Usage (only on the final chunk when the upstream reports it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// OpenAI streaming choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIStreamChoice {
    /// Choice index
    pub index: u32,
    /// Delta content
    pub delta: OpenAIStreamDelta,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// OpenAI streaming delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIStreamDelta {
    /// Role (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl OpenAIContent {
    /// Extract text content
    pub fn extract_text(&self) -> String {
        match self {
            OpenAIContent::Text(text) => text.clone(),
            OpenAIContent::Array(parts) => {
                parts
                    .iter()
                    .filter_map(OpenAIContentPart::as_text)
                    .collect::<Vec<_>>()
                    .join("")
            }
        }
    }

    /// Number of image parts
    pub fn image_count(&self) -> usize {
        match self {
            OpenAIContent::Text(_) => 0,
            OpenAIContent::Array(parts) => {
                parts.iter().filter(|part| matches!(part, OpenAIContentPart::ImageUrl { .. })).count()
            }
        }
    }
}

impl OpenAIImageUrl {
    /// Split a `data:<media>;base64,<data>` URL into media type and payload
    pub fn as_inline_data(&self) -> Option<(&str, &str)> {
        let rest = self.url.strip_prefix("data:")?;
        let (media_type, data) = rest.split_once(";base64,")?;
        Some((media_type, data))
    }
}

impl OpenAIMessage {
    /// Plain-text view of the message content
    pub fn text(&self) -> String {
        self.content.as_ref().map(|c| c.extract_text()).unwrap_or_default()
    }
}

/// Flatten a prompt/input value (string or array of strings) into its text pieces
pub fn input_texts(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}
