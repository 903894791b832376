//! Downstream Gateway Adapter
//!
//! WebSocket implementation of the broadcast port with its own
//! reconnection policy.

mod client;
mod reconnect;

pub use client::{GatewayClient, GatewayConfig, GatewayError, GatewayStats};
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
