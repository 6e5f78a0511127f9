//! Configuration management module
//!
//! Runtime settings come from environment variables; the channel, pricing and
//! token tables come from a JSON file.

pub mod file;
pub mod settings;

pub use file::{AppConfig, ChannelConfig, PricingConfig, ServerConfig, TokenConfig};
pub use settings::Settings;
