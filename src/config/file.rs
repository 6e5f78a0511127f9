//! File-based configuration loading
//!
//! Loads the upstream channel, pricing tables and token table from a JSON file

use crate::services::meta::ChannelType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host (default: "127.0.0.1" - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Application configuration loaded from JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (optional, defaults to localhost:3000)
    #[serde(default)]
    pub server: ServerConfig,

    /// The upstream channel serving every request
    pub channel: ChannelConfig,

    /// Pricing ratios
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Token table, keyed by the bearer key clients present
    #[serde(default)]
    pub tokens: HashMap<String, TokenConfig>,
}

/// Upstream channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel identifier recorded in usage logs
    #[serde(default = "default_channel_id")]
    pub id: u64,

    /// Channel type (e.g., "openai", "azure", "anthropic")
    #[serde(rename = "type")]
    pub channel_type: ChannelType,

    /// Base URL for the provider API (defaults per channel type)
    #[serde(rename = "baseUrl", default)]
    pub base_url: String,

    /// API key
    #[serde(rename = "apiKey", default)]
    pub api_key: String,

    /// Logical model name -> upstream model name
    #[serde(rename = "modelMapping", default)]
    pub model_mapping: HashMap<String, String>,

    /// Opaque provider-specific configuration (a JSON string or object)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

fn default_channel_id() -> u64 {
    1
}

/// Pricing tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(rename = "modelRatio", default)]
    pub model_ratio: HashMap<String, f64>,

    #[serde(rename = "groupRatio", default)]
    pub group_ratio: HashMap<String, f64>,

    #[serde(rename = "completionRatio", default)]
    pub completion_ratio: HashMap<String, f64>,

    /// Ratio for models missing from `modelRatio`
    #[serde(rename = "defaultModelRatio", default = "default_model_ratio")]
    pub default_model_ratio: f64,
}

fn default_model_ratio() -> f64 {
    30.0
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            model_ratio: HashMap::new(),
            group_ratio: HashMap::new(),
            completion_ratio: HashMap::new(),
            default_model_ratio: default_model_ratio(),
        }
    }
}

/// One API token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token identifier used by the ledger
    pub id: String,

    /// Billing group
    #[serde(default = "default_group")]
    pub group: String,

    /// Initial quota balance
    #[serde(default)]
    pub quota: i64,
}

fn default_group() -> String {
    "default".to_string()
}

impl ChannelConfig {
    /// Configured base URL, falling back to the channel type default
    pub fn effective_base_url(&self) -> &str {
        if self.base_url.is_empty() {
            self.channel_type.default_base_url()
        } else {
            &self.base_url
        }
    }

    /// The raw provider-specific configuration as a JSON string
    pub fn config_json(&self) -> Option<String> {
        match &self.config {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(content)
            .with_context(|| "Failed to parse config JSON")?;

        config.validate()?;

        debug!("Loaded channel {} ({:?}) with {} tokens", config.channel.id, config.channel.channel_type, config.tokens.len());
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. the explicit path, when given
    /// 2. ~/.config/relaygate/relaygate.json
    /// 3. ./relaygate.json
    ///
    /// Returns error if no configuration file is found.
    pub fn load_default(explicit: Option<&str>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(Path::new(path));
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("relaygate").join("relaygate.json");
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        let local_path = Path::new("relaygate.json");
        if local_path.exists() {
            return Self::load(local_path);
        }

        anyhow::bail!(
            "Configuration file not found. Please create one at:\n\
             - ~/.config/relaygate/relaygate.json (recommended)\n\
             - ./relaygate.json (current directory)\n\
             or point RELAYGATE_CONFIG at it."
        )
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let base_url = self.channel.effective_base_url();
        if base_url.is_empty() {
            anyhow::bail!("Channel type {:?} requires a baseUrl", self.channel.channel_type);
        }
        if !base_url.starts_with("http") {
            anyhow::bail!("Invalid base URL for channel {}: {}", self.channel.id, base_url);
        }

        if self.channel.channel_type.requires_deployment() && self.channel.config_json().is_none() {
            warn!("Channel {} needs deployment configs but has none; every request will fail", self.channel.id);
        }

        for (key, token) in &self.tokens {
            if key.is_empty() || token.id.is_empty() {
                anyhow::bail!("Token keys and ids cannot be empty");
            }
            if token.quota < 0 {
                anyhow::bail!("Token '{}' has a negative initial quota", token.id);
            }
        }

        let ratios = self.pricing.model_ratio.iter()
            .chain(self.pricing.group_ratio.iter())
            .chain(self.pricing.completion_ratio.iter());
        for (name, ratio) in ratios {
            if !ratio.is_finite() || *ratio < 0.0 {
                anyhow::bail!("Invalid ratio {} for '{}'", ratio, name);
            }
        }
        if !self.pricing.default_model_ratio.is_finite() || self.pricing.default_model_ratio < 0.0 {
            anyhow::bail!("Invalid default model ratio {}", self.pricing.default_model_ratio);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> String {
        r#"{
            "channel": {
                "id": 7,
                "type": "azure",
                "baseUrl": "https://example.openai.azure.com",
                "apiKey": "azure-key",
                "modelMapping": {"gpt4": "gpt-4"},
                "config": {"deployment_configs": [
                    {"model_name": "gpt-4", "deployment_name": "dep1", "api_version": "2023-05-15"}
                ]}
            },
            "pricing": {
                "modelRatio": {"gpt-4": 15},
                "groupRatio": {"vip": 0.5}
            },
            "tokens": {
                "sk-test": {"id": "tok-1", "quota": 1000}
            }
        }"#.to_string()
    }

    #[test]
    fn test_load_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_test_config().as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.channel.id, 7);
        assert_eq!(config.channel.channel_type, ChannelType::Azure);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.tokens["sk-test"].group, "default");
        assert_eq!(config.pricing.default_model_ratio, 30.0);
    }

    #[test]
    fn test_config_json_from_object_and_string() {
        let config = AppConfig::from_json(&create_test_config()).unwrap();
        let json = config.channel.config_json().unwrap();
        assert!(json.contains("dep1"));

        let raw = r#"{"channel": {"type": "azure", "baseUrl": "https://x", "config": "{\"deployment_configs\":[]}"}}"#;
        let config = AppConfig::from_json(raw).unwrap();
        assert_eq!(config.channel.config_json().unwrap(), r#"{"deployment_configs":[]}"#);
    }

    #[test]
    fn test_default_base_url() {
        let raw = r#"{"channel": {"type": "anthropic"}}"#;
        let config = AppConfig::from_json(raw).unwrap();
        assert_eq!(config.channel.effective_base_url(), "https://api.anthropic.com");
    }

    #[test]
    fn test_validation_missing_azure_base_url() {
        let raw = r#"{"channel": {"type": "azure"}}"#;
        assert!(AppConfig::from_json(raw).is_err());
    }

    #[test]
    fn test_validation_negative_ratio() {
        let raw = r#"{"channel": {"type": "openai"}, "pricing": {"modelRatio": {"gpt-4": -1}}}"#;
        assert!(AppConfig::from_json(raw).is_err());
    }

    #[test]
    fn test_validation_invalid_channel_type() {
        let raw = r#"{"channel": {"type": "carrier-pigeon", "baseUrl": "https://x"}}"#;
        assert!(AppConfig::from_json(raw).is_err());
    }
}
