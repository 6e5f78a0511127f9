//! Service layer module
//!
//! Contains relay metadata, model mapping, usage estimation, quota accounting,
//! asynchronous settlement and the relay orchestrator

pub mod meta;
pub mod model_mapper;
pub mod quota;
pub mod relay;
pub mod settlement;
pub mod usage;

pub use meta::{ApiType, ChannelType, RelayMeta, RelayMode, TokenContext};
pub use quota::{InMemoryLedger, QuotaAccountant, QuotaLedger, StaticPricing};
pub use relay::Relay;
pub use settlement::SettlementQueue;
pub use usage::{TiktokenCounter, TokenCounter, UsageEstimator};
