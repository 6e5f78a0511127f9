//! Model name and deployment resolution

use crate::utils::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One Azure-style deployment entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub model_name: String,
    pub deployment_name: String,
    pub api_version: String,
}

/// Deployment table stored in a channel's config blob
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelDeploymentConfig {
    #[serde(default)]
    pub deployment_configs: Vec<DeploymentConfig>,
}

/// Resolve a logical model name through the channel's mapping table
///
/// Returns the resolved name and whether a mapping was applied. Entries that
/// map to an empty string are ignored.
pub fn map_model(model: &str, mapping: &HashMap<String, String>) -> (String, bool) {
    match mapping.get(model) {
        Some(mapped) if !mapped.is_empty() => {
            debug!("Mapped model {} -> {}", model, mapped);
            (mapped.clone(), true)
        }
        _ => (model.to_string(), false),
    }
}

/// Find the deployment serving `model` in the channel config blob
///
/// The first exact `model_name` match wins.
pub fn resolve_deployment(config_json: Option<&str>, model: &str) -> RelayResult<DeploymentConfig> {
    let raw = config_json.ok_or_else(|| RelayError::ConfigNotFound {
        code: "config_not_found",
        message: "channel has no deployment config".to_string(),
    })?;

    let parsed: ChannelDeploymentConfig = serde_json::from_str(raw).map_err(|e| RelayError::ConfigInvalid {
        code: "invalid_config",
        message: format!("invalid channel deployment config: {}", e),
    })?;

    parsed
        .deployment_configs
        .into_iter()
        .find(|deployment| deployment.model_name == model)
        .ok_or_else(|| RelayError::ConfigNotFound {
            code: "deployment_config_not_found",
            message: format!("deployment config for {} not found", model),
        })
}
