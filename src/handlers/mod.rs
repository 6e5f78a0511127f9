//! HTTP handlers module
//!
//! Contains all HTTP endpoint handling logic

pub mod health;
pub mod relay;

use crate::config::{AppConfig, Settings};
use crate::middleware::{auth::token_auth_middleware, logging::request_logging_middleware};
use crate::providers::AdaptorRegistry;
use crate::services::quota::{InMemoryLedger, QuotaAccountant, StaticPricing};
use crate::services::usage::{TiktokenCounter, TokenCounter, UsageEstimator};
use crate::services::{Relay, SettlementQueue};
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, routing::get, routing::post, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state
pub struct AppState {
    pub settings: Settings,
    pub config: AppConfig,
    pub relay: Relay,
    pub ledger: Arc<InMemoryLedger>,
    pub settlement: Arc<SettlementQueue>,
}

impl AppState {
    /// Wire the relay pipeline with the tiktoken counter
    pub fn new(settings: Settings, config: AppConfig) -> Result<Self> {
        Self::with_counter(settings, config, Arc::new(TiktokenCounter::new()))
    }

    /// Wire the relay pipeline with a caller-supplied token counter
    ///
    /// Must be called inside a tokio runtime; the settlement workers are
    /// spawned here.
    pub fn with_counter(settings: Settings, config: AppConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        let estimator = UsageEstimator::new(counter);
        let registry = AdaptorRegistry::with_defaults(&settings, estimator.clone())?;

        let ledger = Arc::new(InMemoryLedger::from_tokens(config.tokens.values()));
        let pricing = Arc::new(StaticPricing::new(config.pricing.clone()));
        let accountant = Arc::new(QuotaAccountant::new(pricing, ledger.clone()));

        let settlement = Arc::new(SettlementQueue::start(
            accountant.clone(),
            settings.settlement.workers,
            settings.settlement.queue_size,
        ));

        let relay = Relay::new(config.channel.clone(), registry, estimator, accountant, settlement.clone());

        info!(
            "Relay ready: channel {} ({:?}), {} tokens",
            config.channel.id,
            config.channel.channel_type,
            config.tokens.len()
        );

        Ok(Self {
            settings,
            config,
            relay,
            ledger,
            settlement,
        })
    }
}

/// Create application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Create middleware stack
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Relay routes require a known token
    let relay_routes = Router::new()
        .route("/v1/chat/completions", post(relay::chat_completions))
        .route("/v1/completions", post(relay::completions))
        .route("/v1/embeddings", post(relay::embeddings))
        .route_layer(from_fn_with_state(state.clone(), token_auth_middleware));

    Router::new()
        .merge(relay_routes)
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .layer(from_fn_with_state(state.clone(), request_logging_middleware))
        .layer(DefaultBodyLimit::max(state.settings.request.max_request_size))
        .with_state(state)
        .layer(middleware_stack)
}
