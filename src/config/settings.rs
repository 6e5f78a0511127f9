//! Application runtime settings
//!
//! Process-level knobs read from the environment (and `.env`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    pub server: ServerSettings,
    /// Upstream HTTP configuration
    pub upstream: UpstreamSettings,
    /// Request configuration
    pub request: RequestSettings,
    /// Settlement worker pool configuration
    pub settlement: SettlementSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
    /// Explicit path of the JSON channel/pricing configuration
    pub config_path: Option<String>,
}

/// Server listen overrides (the JSON file supplies the defaults)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen host override
    pub host: Option<String>,
    /// Listen port override
    pub port: Option<u16>,
}

/// Upstream HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Non-streaming request timeout in seconds
    pub timeout: u64,
    /// Streaming request timeout in seconds
    pub stream_timeout: u64,
}

/// Request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Maximum request size in bytes
    pub max_request_size: usize,
}

/// Settlement worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Number of workers draining the settlement queue
    pub workers: usize,
    /// Queue capacity
    pub queue_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            upstream: UpstreamSettings {
                timeout: 30,
                stream_timeout: 300,
            },
            request: RequestSettings {
                max_request_size: 10 * 1024 * 1024,
            },
            settlement: SettlementSettings {
                workers: 4,
                queue_size: 1024,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                format: "text".to_string(),
            },
            config_path: None,
        }
    }
}

impl Settings {
    /// Create a new settings instance from the environment
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let settings = Self {
            server: ServerSettings {
                host: std::env::var("SERVER_HOST").ok(),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .map(|p| p.parse())
                    .transpose()
                    .context("Invalid port number")?,
            },
            upstream: UpstreamSettings {
                timeout: get_env_or_default("UPSTREAM_TIMEOUT", "30")
                    .parse()
                    .context("Invalid upstream timeout")?,
                stream_timeout: get_env_or_default("STREAM_TIMEOUT", "300")
                    .parse()
                    .context("Invalid stream timeout")?,
            },
            request: RequestSettings {
                max_request_size: get_env_or_default("MAX_REQUEST_SIZE", "10485760")
                    .parse()
                    .context("Invalid maximum request size")?,
            },
            settlement: SettlementSettings {
                workers: get_env_or_default("SETTLEMENT_WORKERS", "4")
                    .parse()
                    .context("Invalid settlement worker count")?,
                queue_size: get_env_or_default("SETTLEMENT_QUEUE_SIZE", "1024")
                    .parse()
                    .context("Invalid settlement queue size")?,
            },
            logging: LoggingSettings {
                level: get_env_or_default("RUST_LOG", "info"),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
            config_path: std::env::var("RELAYGATE_CONFIG").ok().filter(|p| !p.is_empty()),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.server.port == Some(0) {
            anyhow::bail!("Port number cannot be 0");
        }

        if self.upstream.timeout == 0 || self.upstream.stream_timeout == 0 {
            anyhow::bail!("Timeout values cannot be 0");
        }

        if self.request.max_request_size == 0 {
            anyhow::bail!("Maximum request size cannot be 0");
        }

        if self.settlement.workers == 0 {
            anyhow::bail!("At least one settlement worker is required");
        }

        if self.settlement.queue_size == 0 {
            anyhow::bail!("Settlement queue size cannot be 0");
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
