//! Broadcast Channel Adapter
//!
//! In-process [`BroadcastPort`] built on a tokio broadcast channel for
//! fan-out to any number of local receivers. The link state is explicit so
//! the relay's "drop while disconnected" path can be driven without a
//! network.
//!
//! # Example
//!
//! ```rust
//! use option_stream_relay::application::ports::BroadcastPort;
//! use option_stream_relay::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
//!
//! let hub = BroadcastHub::new(BroadcastConfig::default());
//! let mut rx = hub.subscribe();
//! assert!(hub.is_connected());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::application::ports::{BroadcastError, BroadcastPort};
use crate::domain::streaming::OutboundEvent;

/// Configuration for the broadcast channel.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Per-receiver buffer before lagging receivers lose events.
    pub capacity: usize,
    /// Initial link state.
    pub connected: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            connected: true,
        }
    }
}

/// In-process broadcast transport.
#[derive(Debug)]
pub struct BroadcastHub {
    tx: broadcast::Sender<OutboundEvent>,
    connected: AtomicBool,
    sent: AtomicU64,
    unheard: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            tx: broadcast::channel(config.capacity.max(1)).0,
            connected: AtomicBool::new(config.connected),
            sent: AtomicU64::new(0),
            unheard: AtomicU64::new(0),
        }
    }

    /// Create a connected hub with default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Get a new receiver for outbound events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.tx.subscribe()
    }

    /// Number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Force the link state, e.g. to simulate a downstream outage.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Statistics about the hub.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            receivers: self.receiver_count(),
            sent: self.sent.load(Ordering::Relaxed),
            unheard: self.unheard.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl BroadcastPort for BroadcastHub {
    async fn connect(&self) -> Result<(), BroadcastError> {
        self.set_connected(true);
        Ok(())
    }

    async fn disconnect(&self) {
        self.set_connected(false);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutboundEvent) -> Result<(), BroadcastError> {
        if !self.is_connected() {
            return Err(BroadcastError::NotConnected);
        }
        // Sending with no receivers is not a delivery failure for a hub.
        if self.tx.send(event).is_err() {
            self.unheard.fetch_add(1, Ordering::Relaxed);
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Statistics about the broadcast hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Number of active receivers.
    pub receivers: usize,
    /// Events accepted while connected.
    pub sent: u64,
    /// Accepted events that had no receiver.
    pub unheard: u64,
}

// =============================================================================
// Tests
// =============================================================================
