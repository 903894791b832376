//! Broadcast Port (Driven Port)
//!
//! Interface for delivering outbound events to the downstream transport.

use async_trait::async_trait;

use crate::domain::streaming::OutboundEvent;

/// Broadcast error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// Downstream is not connected.
    #[error("downstream not connected")]
    NotConnected,

    /// Outbound queue is full.
    #[error("outbound queue full")]
    QueueFull,

    /// Transport has shut down.
    #[error("broadcast transport closed")]
    Closed,

    /// Record could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Initial connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
}

/// Port for emitting outbound events.
///
/// `emit` must not block: callers invoke it from feed pumps and timer loops.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastPort: Send + Sync {
    /// Start the downstream connection. Reconnection is the adapter's job.
    async fn connect(&self) -> Result<(), BroadcastError>;

    /// Close the downstream connection.
    async fn disconnect(&self);

    /// Whether records can currently be delivered.
    fn is_connected(&self) -> bool;

    /// Queue an event for delivery.
    fn emit(&self, event: OutboundEvent) -> Result<(), BroadcastError>;
}
