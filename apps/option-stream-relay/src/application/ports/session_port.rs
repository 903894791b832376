//! Trading Session Port (Driven Port)
//!
//! Interface to the upstream trading API session: login, contract catalog,
//! per-contract quote subscriptions and on-demand snapshots. Streaming
//! callbacks are delivered through bounded per-event-type queues.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::ContractCatalog;
use crate::domain::contract::Contract;
use crate::domain::price::PriceSignal;
use crate::domain::streaming::RawEvent;

// =============================================================================
// Types
// =============================================================================

/// Quote stream kind for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    /// Trade ticks.
    Tick,
    /// Order book updates.
    BidAsk,
}

impl QuoteKind {
    /// Both kinds, in subscribe order.
    pub const ALL: [Self; 2] = [Self::Tick, Self::BidAsk];

    /// Label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::BidAsk => "bidask",
        }
    }
}

/// Snapshot response: the session may return one entry or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotPayload {
    /// A single snapshot.
    Single(RawEvent),
    /// A list of snapshots.
    Batch(Vec<RawEvent>),
}

impl SnapshotPayload {
    /// Flatten into a list of entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<RawEvent> {
        match self {
            Self::Single(raw) => vec![raw],
            Self::Batch(entries) => entries,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(entries) => entries.len(),
        }
    }

    /// Check if the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trading session error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Session is not logged in.
    #[error("session not connected")]
    NotConnected,

    /// Login failed.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Contract unknown to the session.
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    /// The session refused the request.
    #[error("{operation} rejected for {code}: {reason}")]
    Rejected {
        /// Operation name.
        operation: &'static str,
        /// Contract code.
        code: String,
        /// Rejection reason.
        reason: String,
    },

    /// The call did not complete in time.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// Catalog not yet available.
    #[error("contract catalog unavailable")]
    CatalogUnavailable,
}

// =============================================================================
// Feed Channels
// =============================================================================

/// Producer side of the streaming callback queues.
///
/// Sends never block; an event that does not fit is dropped and counted.
#[derive(Debug, Clone)]
pub struct FeedSender {
    ticks: mpsc::Sender<RawEvent>,
    bid_asks: mpsc::Sender<RawEvent>,
    snapshots: mpsc::Sender<SnapshotPayload>,
    prices: mpsc::Sender<PriceSignal>,
    dropped: Arc<AtomicU64>,
}

/// Consumer side of the streaming callback queues.
#[derive(Debug)]
pub struct FeedReceivers {
    /// Trade ticks.
    pub ticks: mpsc::Receiver<RawEvent>,
    /// Order book updates.
    pub bid_asks: mpsc::Receiver<RawEvent>,
    /// Pushed snapshots.
    pub snapshots: mpsc::Receiver<SnapshotPayload>,
    /// Underlying price signals.
    pub prices: mpsc::Receiver<PriceSignal>,
}

/// Create the bounded feed queues, each with `capacity` slots.
#[must_use]
pub fn feed_channel(capacity: usize) -> (FeedSender, FeedReceivers) {
    let capacity = capacity.max(1);
    let (ticks_tx, ticks_rx) = mpsc::channel(capacity);
    let (bid_asks_tx, bid_asks_rx) = mpsc::channel(capacity);
    let (snapshots_tx, snapshots_rx) = mpsc::channel(capacity);
    let (prices_tx, prices_rx) = mpsc::channel(capacity);

    let sender = FeedSender {
        ticks: ticks_tx,
        bid_asks: bid_asks_tx,
        snapshots: snapshots_tx,
        prices: prices_tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    let receivers = FeedReceivers {
        ticks: ticks_rx,
        bid_asks: bid_asks_rx,
        snapshots: snapshots_rx,
        prices: prices_rx,
    };
    (sender, receivers)
}

impl FeedSender {
    /// Deliver a trade tick. Returns false if it was dropped.
    pub fn send_tick(&self, raw: RawEvent) -> bool {
        self.offer(&self.ticks, raw)
    }

    /// Deliver an order book update. Returns false if it was dropped.
    pub fn send_bid_ask(&self, raw: RawEvent) -> bool {
        self.offer(&self.bid_asks, raw)
    }

    /// Deliver a pushed snapshot. Returns false if it was dropped.
    pub fn send_snapshot(&self, payload: SnapshotPayload) -> bool {
        self.offer(&self.snapshots, payload)
    }

    /// Deliver an underlying price signal. Returns false if it was dropped.
    pub fn send_price(&self, signal: PriceSignal) -> bool {
        self.offer(&self.prices, signal)
    }

    /// Events dropped because a queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer<T>(&self, tx: &mpsc::Sender<T>, item: T) -> bool {
        if tx.try_send(item).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

// =============================================================================
// Port
// =============================================================================

/// Port for the upstream trading session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradingSession: Send + Sync {
    /// Log in and start delivering events to registered feeds.
    async fn connect(&self) -> Result<(), SessionError>;

    /// Log out. Never fails.
    async fn disconnect(&self);

    /// Whether the session is logged in.
    fn is_connected(&self) -> bool;

    /// Whether the session trades against a simulated market.
    fn is_simulation(&self) -> bool;

    /// Contract catalog for the current session.
    fn catalog(&self) -> Result<Arc<dyn ContractCatalog>, SessionError>;

    /// Register the queues that receive streaming callbacks.
    fn register_feed(&self, feed: FeedSender);

    /// Subscribe one quote kind for a contract.
    async fn subscribe(&self, contract: &Contract, kind: QuoteKind) -> Result<(), SessionError>;

    /// Unsubscribe one quote kind for a contract.
    async fn unsubscribe(&self, contract: &Contract, kind: QuoteKind)
    -> Result<(), SessionError>;

    /// Request a snapshot for a contract.
    async fn snapshot(&self, contract: &Contract) -> Result<SnapshotPayload, SessionError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn feed_sender_delivers_and_counts_drops() {
        let (sender, mut receivers) = feed_channel(1);
        let raw = RawEvent::new(json!({"code": "TXO18000C"}));

        assert!(sender.send_tick(raw.clone()));
        assert!(!sender.send_tick(raw.clone()));
        assert_eq!(sender.dropped(), 1);

        assert_eq!(receivers.ticks.recv().await, Some(raw));
        assert!(sender.send_price(PriceSignal::Unavailable));
        assert_eq!(receivers.prices.recv().await, Some(PriceSignal::Unavailable));
    }

    #[tokio::test]
    async fn closed_queue_counts_as_drop() {
        let (sender, receivers) = feed_channel(4);
        drop(receivers);
        assert!(!sender.send_snapshot(SnapshotPayload::Batch(vec![])));
        assert_eq!(sender.dropped(), 1);
    }

    #[test]
    fn snapshot_payload_flattens() {
        let a = RawEvent::new(json!({"code": "A"}));
        let b = RawEvent::new(json!({"code": "B"}));
        assert_eq!(SnapshotPayload::Single(a.clone()).into_entries().len(), 1);
        let batch = SnapshotPayload::Batch(vec![a, b]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.into_entries().len(), 2);
    }
}
