//! Data models module
//!
//! Defines request and response data structures for the canonical (OpenAI)
//! shape and for every upstream protocol the gateway speaks

use serde::{Deserialize, Serialize};

pub mod claude;
pub mod gemini;
pub mod openai;

/// Token usage statistics
///
/// Built through [`Usage::new`] so `total_tokens` always equals
/// `prompt_tokens + completion_tokens`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt token count
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion token count
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total token count
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Usage that only accounts for the prompt
    pub fn prompt_only(prompt_tokens: u32) -> Self {
        Self::new(prompt_tokens, 0)
    }

    /// Re-derive the total from its parts; upstream-reported totals are not trusted
    pub fn normalized(self) -> Self {
        Self::new(self.prompt_tokens, self.completion_tokens)
    }

    /// Whether the upstream reported anything at all
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}
