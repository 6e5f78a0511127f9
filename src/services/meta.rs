//! Per-request relay context
//!
//! Channel/API type tags, relay modes and the `RelayMeta` record threaded
//! through every pipeline stage.

use crate::config::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Upstream channel vendor, as configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    OpenAI,
    Azure,
    Baichuan,
    /// Any other OpenAI-compatible endpoint
    Custom,
    Anthropic,
    Gemini,
}

/// Wire protocol family; selects the adaptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    OpenAI,
    Anthropic,
    Gemini,
}

impl ChannelType {
    /// Protocol family spoken by this channel
    pub fn api_type(self) -> ApiType {
        match self {
            ChannelType::OpenAI | ChannelType::Azure | ChannelType::Baichuan | ChannelType::Custom => {
                ApiType::OpenAI
            }
            ChannelType::Anthropic => ApiType::Anthropic,
            ChannelType::Gemini => ApiType::Gemini,
        }
    }

    /// Whether requests are routed by a per-model deployment entry
    pub fn requires_deployment(self) -> bool {
        matches!(self, ChannelType::Azure)
    }

    /// Whether a native body must be re-serialized so field values get normalized
    ///
    /// Baichuan rejects `frequency_penalty: 0`.
    pub fn requires_body_normalization(self) -> bool {
        matches!(self, ChannelType::Baichuan)
    }

    /// Base URL used when the channel does not set one
    pub fn default_base_url(self) -> &'static str {
        match self {
            ChannelType::OpenAI => "https://api.openai.com",
            ChannelType::Baichuan => "https://api.baichuan-ai.com",
            ChannelType::Anthropic => "https://api.anthropic.com",
            ChannelType::Gemini => "https://generativelanguage.googleapis.com",
            ChannelType::Azure | ChannelType::Custom => "",
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiType::OpenAI => "openai",
            ApiType::Anthropic => "anthropic",
            ApiType::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

/// Request shape, derived from the endpoint path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayMode {
    ChatCompletions,
    Completions,
    Embeddings,
}

impl RelayMode {
    pub fn from_path(path: &str) -> Option<Self> {
        if path.starts_with("/v1/chat/completions") {
            Some(RelayMode::ChatCompletions)
        } else if path.starts_with("/v1/completions") {
            Some(RelayMode::Completions)
        } else if path.starts_with("/v1/embeddings") {
            Some(RelayMode::Embeddings)
        } else {
            None
        }
    }

    /// OpenAI endpoint path for this mode
    pub fn path(self) -> &'static str {
        match self {
            RelayMode::ChatCompletions => "/v1/chat/completions",
            RelayMode::Completions => "/v1/completions",
            RelayMode::Embeddings => "/v1/embeddings",
        }
    }

    /// Azure task segment for this mode
    pub fn azure_task(self) -> &'static str {
        match self {
            RelayMode::ChatCompletions => "chat/completions",
            RelayMode::Completions => "completions",
            RelayMode::Embeddings => "embeddings",
        }
    }
}

/// Identity of the caller, resolved by the token middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenContext {
    pub token_id: String,
    pub group: String,
}

/// Per-request relay context
///
/// Owned by exactly one in-flight request. Stage ownership of the mutable
/// fields:
/// - validation sets `is_stream`
/// - meta resolution sets `origin_model`, `deployment_name`, `api_version`
/// - model mapping sets `actual_model`
/// - estimation sets `prompt_tokens`
/// - dispatch may only flip `is_stream` to true (SSE content type)
#[derive(Debug, Clone)]
pub struct RelayMeta {
    pub channel_id: u64,
    pub channel_type: ChannelType,
    pub api_type: ApiType,
    pub mode: RelayMode,
    pub base_url: String,
    pub api_key: String,
    pub model_mapping: HashMap<String, String>,
    pub token_id: String,
    pub group: String,
    pub origin_model: String,
    pub actual_model: String,
    pub is_stream: bool,
    pub deployment_name: Option<String>,
    pub api_version: Option<String>,
    pub prompt_tokens: u32,
}

impl RelayMeta {
    pub fn new(channel: &ChannelConfig, token: &TokenContext, mode: RelayMode) -> Self {
        Self {
            channel_id: channel.id,
            channel_type: channel.channel_type,
            api_type: channel.channel_type.api_type(),
            mode,
            base_url: channel.effective_base_url().trim_end_matches('/').to_string(),
            api_key: channel.api_key.clone(),
            model_mapping: channel.model_mapping.clone(),
            token_id: token.token_id.clone(),
            group: token.group.clone(),
            origin_model: String::new(),
            actual_model: String::new(),
            is_stream: false,
            deployment_name: None,
            api_version: None,
            prompt_tokens: 0,
        }
    }
}
