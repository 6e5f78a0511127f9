//! relaygate library
//!
//! Relays OpenAI-shaped text requests to a configured upstream channel with
//! quota reservation before dispatch and settlement after the response

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::{AppConfig, Settings};
pub use handlers::{create_router, AppState};
pub use models::{claude, gemini, openai, Usage};
pub use services::{Relay, SettlementQueue};
pub use utils::error::{RelayError, RelayResult};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
