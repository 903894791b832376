//! Configuration Module
//!
//! Environment-driven configuration for the relay.

mod settings;

pub use settings::{
    ConfigError, Credentials, GatewaySettings, LoopSettings, RelayConfig, ServerSettings,
    SimulationSettings, StrikeSettings,
};
