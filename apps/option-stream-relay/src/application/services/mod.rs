//! Application Services
//!
//! Use cases built on the ports:
//!
//! - `ContractManager`: keeps the ATM subscription window reconciled
//! - `MarketDataHandler`: normalizes session callbacks into outbound records
//! - `StreamingOrchestrator`: lifecycle, feed pumps and timer loops

mod contract_manager;
mod market_data_handler;
mod orchestrator;

pub use contract_manager::{ContractManager, ContractManagerConfig, RefreshResult, TargetSelection};
pub use market_data_handler::{EventStats, HandlerStats, MarketDataHandler, SERVICE_NAME};
pub use orchestrator::{
    LifecycleState, RelayError, RelayStatus, StopReason, StreamingOrchestrator,
};
