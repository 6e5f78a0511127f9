//! Quota accounting
//!
//! A request reserves quota from its prompt estimate before dispatch, then
//! either settles against the real usage or refunds the whole reservation.
//! `Reservation` is consumed by value on both paths, so a reservation can be
//! neither settled twice nor refunded after settlement.

use crate::config::{PricingConfig, TokenConfig};
use crate::models::Usage;
use crate::utils::error::{RelayError, RelayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Estimates and reports may drift this far (fraction of the estimate)...
const DIVERGENCE_RATIO: f64 = 0.5;
/// ...and this many tokens before a warning is raised
const DIVERGENCE_MIN_TOKENS: u32 = 16;

/// Source of pricing ratios
pub trait PricingSource: Send + Sync {
    fn model_ratio(&self, model: &str) -> f64;
    fn group_ratio(&self, group: &str) -> f64;
    fn completion_ratio(&self, _model: &str) -> f64 {
        1.0
    }
}

/// Pricing tables loaded from the configuration file
#[derive(Debug, Clone)]
pub struct StaticPricing {
    config: PricingConfig,
}

impl StaticPricing {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }
}

impl PricingSource for StaticPricing {
    fn model_ratio(&self, model: &str) -> f64 {
        self.config
            .model_ratio
            .get(model)
            .copied()
            .unwrap_or(self.config.default_model_ratio)
    }

    fn group_ratio(&self, group: &str) -> f64 {
        self.config.group_ratio.get(group).copied().unwrap_or(1.0)
    }

    fn completion_ratio(&self, model: &str) -> f64 {
        self.config.completion_ratio.get(model).copied().unwrap_or(1.0)
    }
}

/// Ledger failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient quota: required {required}, remaining {remaining}")]
    InsufficientQuota { required: i64, remaining: i64 },

    #[error("unknown token: {0}")]
    UnknownToken(String),
}

impl From<LedgerError> for RelayError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientQuota { required, remaining } => {
                RelayError::InsufficientQuota { required, remaining }
            }
            other => RelayError::Ledger(other.to_string()),
        }
    }
}

/// Account balance store
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Atomically subtract `amount`; refuses to go below zero
    async fn deduct(&self, token_id: &str, amount: i64) -> Result<(), LedgerError>;

    /// Unconditionally adjust the balance by a signed amount
    async fn add(&self, token_id: &str, amount: i64) -> Result<(), LedgerError>;

    async fn balance(&self, token_id: &str) -> Result<i64, LedgerError>;

    async fn record_usage_log(&self, entry: UsageLogEntry) -> Result<(), LedgerError>;
}

/// In-process ledger seeded from the token table
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<String, i64>>,
    logs: Mutex<Vec<UsageLogEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a TokenConfig>) -> Self {
        let balances = tokens
            .into_iter()
            .map(|token| (token.id.clone(), token.quota))
            .collect();
        Self {
            balances: Mutex::new(balances),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_balance(&self, token_id: &str, amount: i64) {
        self.balances.lock().await.insert(token_id.to_string(), amount);
    }

    /// Snapshot of recorded usage logs
    pub async fn usage_logs(&self) -> Vec<UsageLogEntry> {
        self.logs.lock().await.clone()
    }
}

#[async_trait]
impl QuotaLedger for InMemoryLedger {
    async fn deduct(&self, token_id: &str, amount: i64) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock().await;
        let balance = balances
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::UnknownToken(token_id.to_string()))?;
        if *balance < amount {
            return Err(LedgerError::InsufficientQuota {
                required: amount,
                remaining: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    async fn add(&self, token_id: &str, amount: i64) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock().await;
        let balance = balances
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::UnknownToken(token_id.to_string()))?;
        *balance += amount;
        Ok(())
    }

    async fn balance(&self, token_id: &str) -> Result<i64, LedgerError> {
        self.balances
            .lock()
            .await
            .get(token_id)
            .copied()
            .ok_or_else(|| LedgerError::UnknownToken(token_id.to_string()))
    }

    async fn record_usage_log(&self, entry: UsageLogEntry) -> Result<(), LedgerError> {
        self.logs.lock().await.push(entry);
        Ok(())
    }
}

/// Ratios in effect for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingRatio {
    pub model_ratio: f64,
    pub group_ratio: f64,
    pub completion_ratio: f64,
}

impl PricingRatio {
    /// Combined prompt-side ratio
    pub fn ratio(&self) -> f64 {
        self.model_ratio * self.group_ratio
    }

    fn note(&self) -> String {
        format!(
            "model ratio {:.2}, group ratio {:.2}, completion ratio {:.2}",
            self.model_ratio, self.group_ratio, self.completion_ratio
        )
    }
}

/// Quota held for one in-flight request
#[must_use = "a reservation must be refunded or settled"]
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    token_id: String,
    amount: i64,
}

impl Reservation {
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}

/// Everything post-consume needs to settle one successful request
#[derive(Debug)]
pub struct SettlementJob {
    pub reservation: Reservation,
    pub usage: Usage,
    pub pricing: PricingRatio,
    pub channel_id: u64,
    pub origin_model: String,
    pub actual_model: String,
    pub is_stream: bool,
    pub estimated_prompt_tokens: u32,
}

/// Billing record written after settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub token_id: String,
    pub channel_id: u64,
    pub origin_model: String,
    pub actual_model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub quota: i64,
    pub model_ratio: f64,
    pub group_ratio: f64,
    pub completion_ratio: f64,
    pub is_stream: bool,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

/// Final cost of a request in quota units
pub fn settlement_cost(usage: &Usage, pricing: &PricingRatio) -> i64 {
    let ratio = pricing.ratio();
    let weighted = usage.prompt_tokens as f64 + usage.completion_tokens as f64 * pricing.completion_ratio;
    let cost = (weighted * ratio).ceil() as i64;
    if ratio != 0.0 && cost <= 0 {
        1
    } else {
        cost
    }
}

/// Whether a reported prompt count drifted far enough from the estimate to flag
pub fn prompt_divergence(estimated: u32, reported: u32) -> bool {
    let diff = estimated.abs_diff(reported);
    diff > DIVERGENCE_MIN_TOKENS && diff as f64 > estimated as f64 * DIVERGENCE_RATIO
}

/// Reservation, settlement and refund against a ledger
pub struct QuotaAccountant {
    pricing: Arc<dyn PricingSource>,
    ledger: Arc<dyn QuotaLedger>,
}

impl QuotaAccountant {
    pub fn new(pricing: Arc<dyn PricingSource>, ledger: Arc<dyn QuotaLedger>) -> Self {
        Self { pricing, ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn QuotaLedger> {
        &self.ledger
    }

    /// Look up and validate the ratios for a request
    pub fn pricing(&self, model: &str, group: &str) -> RelayResult<PricingRatio> {
        let pricing = PricingRatio {
            model_ratio: self.pricing.model_ratio(model),
            group_ratio: self.pricing.group_ratio(group),
            completion_ratio: self.pricing.completion_ratio(model),
        };

        for (name, value) in [
            ("model", pricing.model_ratio),
            ("group", pricing.group_ratio),
            ("completion", pricing.completion_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RelayError::ConfigInvalid {
                    code: "invalid_pricing",
                    message: format!("invalid {} ratio {} for model {} in group {}", name, value, model, group),
                });
            }
        }

        Ok(pricing)
    }

    /// Reserve `⌊prompt_tokens × ratio⌋` from the token's balance
    pub async fn pre_consume(
        &self,
        token_id: &str,
        prompt_tokens: u32,
        pricing: &PricingRatio,
    ) -> RelayResult<Reservation> {
        let amount = (prompt_tokens as f64 * pricing.ratio()).floor() as i64;

        self.ledger.deduct(token_id, amount).await?;

        debug!("Reserved {} quota for token {} ({} prompt tokens)", amount, token_id, prompt_tokens);
        Ok(Reservation {
            token_id: token_id.to_string(),
            amount,
        })
    }

    /// Settle a successful request; failures are logged, never returned
    pub async fn post_consume(&self, job: SettlementJob) {
        let SettlementJob {
            reservation,
            usage,
            pricing,
            channel_id,
            origin_model,
            actual_model,
            is_stream,
            estimated_prompt_tokens,
        } = job;

        if prompt_divergence(estimated_prompt_tokens, usage.prompt_tokens) {
            warn!(
                "Prompt token estimate {} diverges from reported {} for model {}",
                estimated_prompt_tokens, usage.prompt_tokens, actual_model
            );
        }

        let cost = settlement_cost(&usage, &pricing);
        let delta = reservation.amount - cost;
        if delta != 0 {
            if let Err(e) = self.ledger.add(&reservation.token_id, delta).await {
                error!("Failed to settle quota for token {}: {}", reservation.token_id, e);
                return;
            }
        }

        let entry = UsageLogEntry {
            token_id: reservation.token_id.clone(),
            channel_id,
            origin_model,
            actual_model,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            quota: cost,
            model_ratio: pricing.model_ratio,
            group_ratio: pricing.group_ratio,
            completion_ratio: pricing.completion_ratio,
            is_stream,
            created_at: Utc::now(),
            content: pricing.note(),
        };
        if let Err(e) = self.ledger.record_usage_log(entry).await {
            error!("Failed to record usage log for token {}: {}", reservation.token_id, e);
        }

        info!(
            "Settled token {}: reserved {}, charged {} ({} prompt + {} completion tokens)",
            reservation.token_id, reservation.amount, cost, usage.prompt_tokens, usage.completion_tokens
        );
    }

    /// Return a reservation in full
    pub async fn refund(&self, reservation: Reservation) {
        if reservation.amount == 0 {
            return;
        }
        match self.ledger.add(&reservation.token_id, reservation.amount).await {
            Ok(()) => debug!("Refunded {} quota to token {}", reservation.amount, reservation.token_id),
            Err(e) => error!("Failed to refund {} quota to token {}: {}", reservation.amount, reservation.token_id, e),
        }
    }
}
