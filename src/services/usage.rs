//! Token counting and usage estimation
//!
//! Prompt tokens are estimated before dispatch to size the quota reservation;
//! completion usage is recomputed from response text when the upstream does
//! not report it.

use crate::models::openai::{input_texts, TextRequest};
use crate::models::Usage;
use crate::services::meta::RelayMode;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer};
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Flat token charge per image part
pub const IMAGE_TOKENS: u32 = 85;

/// Counts tokens of a text for a given model family
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str, model: &str) -> u32;
}

static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!("Failed to load cl100k_base encoding, falling back to character estimate: {}", e);
        None
    }
});

static O200K: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::o200k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!("Failed to load o200k_base encoding, falling back to character estimate: {}", e);
        None
    }
});

/// BPE counter backed by tiktoken
///
/// Models tiktoken maps to `o200k_base` use that encoding; everything else
/// (including non-OpenAI models) is counted with `cl100k_base`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiktokenCounter;

impl TiktokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Load both encodings up front, off the request path
    pub fn preload() {
        Lazy::force(&CL100K);
        Lazy::force(&O200K);
    }

    fn bpe_for(model: &str) -> Option<&'static CoreBPE> {
        match get_tokenizer(model) {
            Some(Tokenizer::O200kBase) => O200K.as_ref().or(CL100K.as_ref()),
            _ => CL100K.as_ref(),
        }
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str, model: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        match Self::bpe_for(model) {
            Some(bpe) => bpe.encode_with_special_tokens(text).len() as u32,
            None => estimate_by_chars(text),
        }
    }
}

/// Rough estimate of ~4 characters per token
pub fn estimate_by_chars(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    (chars + 3) / 4
}

/// Prompt and completion usage estimation over a shared counter
#[derive(Clone)]
pub struct UsageEstimator {
    counter: Arc<dyn TokenCounter>,
}

impl UsageEstimator {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Estimate prompt tokens for the request shape selected by `mode`
    ///
    /// Never fails; unknown or missing shapes count as zero.
    pub fn estimate_prompt_tokens(&self, request: &TextRequest, mode: RelayMode) -> u32 {
        match mode {
            RelayMode::ChatCompletions => self.count_message_tokens(request),
            RelayMode::Completions => self.count_input(request.prompt.as_ref(), &request.model),
            RelayMode::Embeddings => self.count_input(request.input.as_ref(), &request.model),
        }
    }

    /// Usage for a response whose completion is only available as text
    pub fn usage_from_text(&self, text: &str, model: &str, prompt_tokens: u32) -> Usage {
        Usage::new(prompt_tokens, self.counter.count_tokens(text, model))
    }

    pub fn count_text(&self, text: &str, model: &str) -> u32 {
        self.counter.count_tokens(text, model)
    }

    fn count_message_tokens(&self, request: &TextRequest) -> u32 {
        let model = request.model.as_str();
        let (tokens_per_message, tokens_per_name): (i64, i64) = if model == "gpt-3.5-turbo-0301" {
            (4, -1)
        } else {
            (3, 1)
        };

        let mut total: i64 = 0;
        for message in &request.messages {
            total += tokens_per_message;
            total += self.counter.count_tokens(&message.role, model) as i64;
            if let Some(content) = &message.content {
                total += self.counter.count_tokens(&content.extract_text(), model) as i64;
                total += content.image_count() as i64 * IMAGE_TOKENS as i64;
            }
            if let Some(name) = &message.name {
                total += tokens_per_name;
                total += self.counter.count_tokens(name, model) as i64;
            }
        }
        // every reply is primed with <|start|>assistant<|message|>
        total += 3;

        total.clamp(0, u32::MAX as i64) as u32
    }

    fn count_input(&self, value: Option<&serde_json::Value>, model: &str) -> u32 {
        value
            .map(input_texts)
            .unwrap_or_default()
            .iter()
            .map(|text| self.counter.count_tokens(text, model))
            .fold(0u32, |acc, n| acc.saturating_add(n))
    }
}
