//! Claude API data models
//!
//! Anthropic Messages API request, response and stream event structures

use serde::{Deserialize, Serialize};

/// Claude API request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeRequest {
    /// Model name
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Message list
    pub messages: Vec<ClaudeMessage>,
    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Temperature parameter (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p parameter (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Stop sequences (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Whether to stream response (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Claude message structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    /// Role (user/assistant)
    pub role: String,
    /// Message content
    pub content: ClaudeContent,
}

/// Claude content type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeContent {
    /// Plain text content
    Text(String),
    /// Structured content blocks
    Blocks(Vec<ClaudeContentBlock>),
}

/// Claude content block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeContentBlock {
    /// Text block
    #[serde(rename = "text")]
    Text { text: String },
    /// Image block
    #[serde(rename = "image")]
    Image {
        source: ClaudeImageSource,
    },
    /// Blocks the relay passes over (tool_use, thinking, ...)
    #[serde(other)]
    Other,
}

/// Claude image source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeImageSource {
    /// Source type (base64 or url)
    #[serde(rename = "type")]
    pub source_type: String,
    /// Media type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Image data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Claude API response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeResponse {
    /// Response ID
    pub id: String,
    /// Response content
    #[serde(default)]
    pub content: Vec<ClaudeContentBlock>,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Usage statistics
    #[serde(default)]
    pub usage: ClaudeUsage,
}

/// Claude usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClaudeUsage {
    /// Input token count
    #[serde(default)]
    pub input_tokens: u32,
    /// Output token count
    #[serde(default)]
    pub output_tokens: u32,
}

/// Claude streaming response event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeStreamEvent {
    /// Message start
    #[serde(rename = "message_start")]
    MessageStart {
        message: ClaudeStreamMessage,
    },
    /// Content block delta
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        index: u32,
        delta: ClaudeContentDelta,
    },
    /// Message delta
    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: ClaudeMessageDelta,
        #[serde(default)]
        usage: ClaudeUsage,
    },
    /// Message stop
    #[serde(rename = "message_stop")]
    MessageStop,
    /// Error event
    #[serde(rename = "error")]
    Error {
        error: ClaudeError,
    },
    /// ping, content_block_start, content_block_stop
    #[serde(other)]
    Other,
}

/// Claude streaming message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeStreamMessage {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: ClaudeUsage,
}

/// Claude content delta
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeContentDelta {
    /// Text delta
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

/// Claude message delta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Claude error structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ClaudeContent {
    /// Extract text content
    pub fn extract_text(&self) -> String {
        match self {
            ClaudeContent::Text(text) => text.clone(),
            ClaudeContent::Blocks(blocks) => extract_block_text(blocks),
        }
    }
}

/// Concatenate the text blocks of a content list
pub fn extract_block_text(blocks: &[ClaudeContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ClaudeContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Map Anthropic stop reasons onto OpenAI finish reasons
pub fn stop_reason_to_finish_reason(reason: Option<&str>) -> Option<String> {
    reason.map(|r| match r {
        "end_turn" | "stop_sequence" => "stop".to_string(),
        "max_tokens" => "length".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    })
}
