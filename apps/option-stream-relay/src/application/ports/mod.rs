//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TradingSession`: upstream market data session (subscriptions, snapshots)
//! - `ContractCatalog`: read-only contract lookup for the session
//! - `BroadcastPort`: downstream fan-out of normalized records

mod broadcast_port;
mod catalog_port;
mod session_port;

pub use broadcast_port::{BroadcastError, BroadcastPort};
pub use catalog_port::ContractCatalog;
pub use session_port::{
    FeedReceivers, FeedSender, QuoteKind, SessionError, SnapshotPayload, TradingSession,
    feed_channel,
};

#[cfg(test)]
pub use broadcast_port::MockBroadcastPort;
#[cfg(test)]
pub use catalog_port::MockContractCatalog;
#[cfg(test)]
pub use session_port::MockTradingSession;
