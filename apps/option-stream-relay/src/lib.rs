#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Option Stream Relay - Near-the-money Options Market Data Relay
//!
//! Tracks the price of an underlying instrument, keeps the option contracts
//! around the at-the-money strike subscribed on an upstream trading session,
//! and relays normalized ticks, order book updates and snapshots to a
//! downstream gateway.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types and rules
//!   - `contract`: Contract identity and the strike ladder
//!   - `price`: Shared underlying price state
//!   - `subscription`: Subscription set and reconciliation outcomes
//!   - `streaming`: Raw events, normalized records, outbound events
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Trading session, contract catalog, broadcast transport
//!   - `services`: Contract manager, market data handler, orchestrator
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `session`: Simulated and scripted trading sessions
//!   - `catalog`: In-memory contract catalog
//!   - `gateway`: WebSocket broadcast client
//!   - `broadcast`: In-process broadcast transport
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                      ┌──────────────┐  ticks    ┌──────────────┐
//! Trading session ────►│  feed queues │──────────►│  market data │──► gateway
//!   ▲                  └──────┬───────┘  bidask   │   handler    │
//!   │                         │ price             └──────────────┘
//!   │ subscribe/              ▼                          ▲
//!   │ unsubscribe      ┌──────────────┐  snapshots       │
//!   └──────────────────│   contract   │──────────────────┘
//!                      │   manager    │
//!                      └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::contract::{Contract, ContractKey, OptionType, StrikeLadder};
pub use domain::price::{PriceSignal, PriceSnapshot, PriceState, PriceUpdate};
pub use domain::streaming::{EventKind, OutboundEvent, RawEvent};
pub use domain::subscription::{ReconcileOutcome, SubscriptionChanges, SubscriptionSet};

// Ports
pub use application::ports::{
    BroadcastError, BroadcastPort, ContractCatalog, QuoteKind, SessionError, SnapshotPayload,
    TradingSession,
};

// Services
pub use application::services::{
    ContractManager, LifecycleState, MarketDataHandler, RelayError, RelayStatus, StopReason,
    StreamingOrchestrator,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Credentials, RelayConfig};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Adapters (for integration tests)
pub use infrastructure::broadcast::{BroadcastConfig, BroadcastHub, SharedBroadcastHub};
pub use infrastructure::catalog::{CatalogEntry, SessionCatalog};
pub use infrastructure::gateway::{GatewayClient, GatewayConfig};
pub use infrastructure::session::{ScriptedOp, ScriptedSession, SimulatedSession};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
