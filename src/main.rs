//! relaygate server
//!
//! Multi-provider relay gateway: OpenAI-compatible endpoints in front of one
//! upstream channel, with per-token quota accounting

use anyhow::{Context, Result};
use relaygate::config::{AppConfig, Settings};
use relaygate::services::TiktokenCounter;
use relaygate::{create_router, AppState};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load process settings from environment (and .env)
    let settings = Settings::new().context("Failed to load server settings")?;

    // Initialize logging
    init_logging(&settings)?;
    info!("{}", relaygate::version_info());

    // Load channel, pricing and token configuration from JSON file (required)
    let app_config = AppConfig::load_default(settings.config_path.as_deref())
        .context("Failed to load channel configuration")?;
    info!("📁 Channel configuration loaded");

    // Load tokenizer tables up front
    TiktokenCounter::preload();

    let host = settings.server.host.clone().unwrap_or_else(|| app_config.server.host.clone());
    let port = settings.server.port.unwrap_or(app_config.server.port);
    let addr = format!("{}:{}", host, port);

    let state = Arc::new(AppState::new(settings, app_config).context("Failed to build relay state")?);
    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🚀 relaygate server started!");
    info!("📝 Health check: http://{}/health", addr);
    info!("🔄 Relay endpoints: http://{}/v1/chat/completions, /v1/completions, /v1/embeddings", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    info!("Draining settlement queue");
    state.settlement.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize logging system
fn init_logging(settings: &Settings) -> Result<()> {
    let log_level = settings.logging.level.clone();

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if settings.logging.format == "json" {
        // JSON format logs (production environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(log_level)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        )
    } else {
        // Human readable format (development environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(log_level)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    Ok(())
}
