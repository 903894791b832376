//! Market Data Handler
//!
//! Normalizes raw session events into outbound records and hands them to the
//! broadcast port. Nothing here blocks or fails outward: malformed events and
//! undeliverable records are counted and logged, then dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::application::ports::{BroadcastError, BroadcastPort, SnapshotPayload};
use crate::domain::streaming::{
    BidAskRecord, EventKind, ExtractError, FaultRecord, OutboundEvent, RawEvent, SnapshotRecord,
    TickRecord,
};
use crate::infrastructure::metrics::{self, DropReason};

/// Service name attached to fault records.
pub const SERVICE_NAME: &str = "option-stream-relay";

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct KindCounters {
    received: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
    failed: AtomicU64,
}

impl KindCounters {
    fn snapshot(&self) -> EventStats {
        EventStats {
            received: self.received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    /// Raw events or records offered to the handler.
    pub received: u64,
    /// Records accepted by the broadcast port.
    pub emitted: u64,
    /// Records skipped because downstream was unavailable or full.
    pub dropped: u64,
    /// Raw events that could not be normalized.
    pub malformed: u64,
    /// Records the broadcast port rejected with an error.
    pub failed: u64,
}

/// Counters for every event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandlerStats {
    /// Trade ticks.
    pub tick: EventStats,
    /// Order book updates.
    pub bid_ask: EventStats,
    /// Snapshot entries.
    pub snapshot: EventStats,
    /// Heartbeats.
    pub heartbeat: EventStats,
    /// Fault notifications.
    pub fault: EventStats,
    /// Ready notifications.
    pub ready: EventStats,
}

// =============================================================================
// Handler
// =============================================================================

/// Turns session callbacks into broadcast records.
pub struct MarketDataHandler {
    broadcast: Arc<dyn BroadcastPort>,
    counters: [KindCounters; 6],
}

impl MarketDataHandler {
    /// Create a handler emitting through `broadcast`.
    #[must_use]
    pub fn new(broadcast: Arc<dyn BroadcastPort>) -> Self {
        Self {
            broadcast,
            counters: Default::default(),
        }
    }

    /// Normalize and relay a trade tick.
    pub fn on_tick(&self, raw: &RawEvent) -> bool {
        self.counters(EventKind::Tick).received.fetch_add(1, Ordering::Relaxed);
        metrics::record_feed_event(EventKind::Tick);
        match TickRecord::from_raw(raw, Utc::now()) {
            Ok(record) => self.deliver(OutboundEvent::Tick(record)),
            Err(e) => {
                self.malformed(EventKind::Tick, raw, &e);
                false
            }
        }
    }

    /// Normalize and relay an order book update.
    pub fn on_bid_ask(&self, raw: &RawEvent) -> bool {
        self.counters(EventKind::BidAsk).received.fetch_add(1, Ordering::Relaxed);
        metrics::record_feed_event(EventKind::BidAsk);
        match BidAskRecord::from_raw(raw, Utc::now()) {
            Ok(record) => self.deliver(OutboundEvent::BidAsk(record)),
            Err(e) => {
                self.malformed(EventKind::BidAsk, raw, &e);
                false
            }
        }
    }

    /// Relay every entry of a snapshot payload. Returns the number emitted.
    ///
    /// Entries are independent: a malformed one is skipped and the rest still
    /// go out.
    pub fn on_snapshot(&self, payload: SnapshotPayload) -> usize {
        let received_at = Utc::now();
        payload
            .into_entries()
            .iter()
            .filter(|raw| {
                self.counters(EventKind::Snapshot).received.fetch_add(1, Ordering::Relaxed);
                metrics::record_feed_event(EventKind::Snapshot);
                match SnapshotRecord::from_raw(raw, received_at) {
                    Ok(record) => self.deliver(OutboundEvent::Snapshot(record)),
                    Err(e) => {
                        self.malformed(EventKind::Snapshot, raw, &e);
                        false
                    }
                }
            })
            .count()
    }

    /// Emit a fault notification.
    pub fn on_fault(&self, error: &str, contract: Option<&str>) -> bool {
        self.publish(OutboundEvent::Fault(FaultRecord {
            error: error.to_string(),
            service: SERVICE_NAME,
            contract: contract.map(ToOwned::to_owned),
            timestamp: Utc::now(),
        }))
    }

    /// Emit an already-built service record (heartbeat, ready, fault).
    pub fn publish(&self, event: OutboundEvent) -> bool {
        self.counters(event.kind()).received.fetch_add(1, Ordering::Relaxed);
        self.deliver(event)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            tick: self.counters(EventKind::Tick).snapshot(),
            bid_ask: self.counters(EventKind::BidAsk).snapshot(),
            snapshot: self.counters(EventKind::Snapshot).snapshot(),
            heartbeat: self.counters(EventKind::Heartbeat).snapshot(),
            fault: self.counters(EventKind::Fault).snapshot(),
            ready: self.counters(EventKind::Ready).snapshot(),
        }
    }

    fn deliver(&self, event: OutboundEvent) -> bool {
        let kind = event.kind();
        let counters = self.counters(kind);

        if !self.broadcast.is_connected() {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_dropped(kind, DropReason::Disconnected, 1);
            trace!(event = kind.as_str(), "Downstream not connected, record dropped");
            return false;
        }

        let code = event.contract_code().map(ToOwned::to_owned);
        match self.broadcast.emit(event) {
            Ok(()) => {
                counters.emitted.fetch_add(1, Ordering::Relaxed);
                metrics::record_emitted(kind);
                true
            }
            Err(BroadcastError::NotConnected) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_dropped(kind, DropReason::Disconnected, 1);
                trace!(event = kind.as_str(), "Downstream went away, record dropped");
                false
            }
            Err(BroadcastError::QueueFull) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_dropped(kind, DropReason::QueueFull, 1);
                debug!(event = kind.as_str(), code = ?code, "Outbound queue full, record dropped");
                false
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_dropped(kind, DropReason::TransportError, 1);
                warn!(event = kind.as_str(), code = ?code, error = %e, "Failed to emit record");
                false
            }
        }
    }

    fn malformed(&self, kind: EventKind, raw: &RawEvent, error: &ExtractError) {
        self.counters(kind).malformed.fetch_add(1, Ordering::Relaxed);
        metrics::record_malformed(kind);
        warn!(
            event = kind.as_str(),
            code = ?raw.text("code"),
            error = %error,
            "Dropping malformed event"
        );
    }

    const fn counters(&self, kind: EventKind) -> &KindCounters {
        let index = match kind {
            EventKind::Tick => 0,
            EventKind::BidAsk => 1,
            EventKind::Snapshot => 2,
            EventKind::Heartbeat => 3,
            EventKind::Fault => 4,
            EventKind::Ready => 5,
        };
        &self.counters[index]
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::application::ports::MockBroadcastPort;
    use crate::infrastructure::broadcast::BroadcastHub;

    fn tick(code: &str) -> RawEvent {
        RawEvent::new(json!({
            "code": code,
            "datetime": "2024-01-02 09:00:00.000000",
            "open": 100.0,
            "close": 105.0,
            "volume": 3,
            "total_volume": 120
        }))
    }

    #[test]
    fn tick_is_normalized_and_emitted() {
        let hub = Arc::new(BroadcastHub::with_defaults());
        let mut rx = hub.subscribe();
        let handler = MarketDataHandler::new(hub);

        assert!(handler.on_tick(&tick("TXO18000C")));

        let Ok(OutboundEvent::Tick(record)) = rx.try_recv() else {
            panic!("expected a tick");
        };
        assert_eq!(record.code, "TXO18000C");
        assert_eq!(record.close, Some(Decimal::from(105)));
        assert_eq!(record.price, record.close);
        assert_eq!(record.change, Some(Decimal::from(5)));
        assert_eq!(handler.stats().tick.emitted, 1);
    }

    #[test]
    fn disconnected_downstream_drops_silently() {
        let mut broadcast = MockBroadcastPort::new();
        broadcast.expect_is_connected().return_const(false);
        broadcast.expect_emit().never();
        let handler = MarketDataHandler::new(Arc::new(broadcast));

        assert!(!handler.on_tick(&tick("TXO18000C")));
        assert!(!handler.on_bid_ask(&RawEvent::new(json!({
            "code": "TXO18000C",
            "bid_price": [99.0, 98.0],
            "ask_price": [101.0, 102.0]
        }))));
        assert_eq!(
            handler.on_snapshot(SnapshotPayload::Single(RawEvent::new(
                json!({"code": "TXO18000C", "close": 100.0})
            ))),
            0
        );
        assert_eq!(
            handler.on_snapshot(SnapshotPayload::Batch(vec![
                RawEvent::new(json!({"code": "TXO17900C", "close": 310.0})),
                RawEvent::new(json!({"code": "TXO18100C", "close": 190.0})),
            ])),
            0
        );
        assert!(!handler.on_fault("boom", None));

        let stats = handler.stats();
        for (kind, received) in [
            (stats.tick, 1),
            (stats.bid_ask, 1),
            (stats.snapshot, 3),
            (stats.fault, 1),
        ] {
            assert_eq!(kind.received, received);
            assert_eq!(kind.dropped, received);
            assert_eq!(kind.emitted, 0);
            assert_eq!(kind.malformed, 0);
        }
    }

    #[test]
    fn malformed_tick_is_counted_not_emitted() {
        let mut broadcast = MockBroadcastPort::new();
        broadcast.expect_is_connected().return_const(true);
        broadcast.expect_emit().never();
        let handler = MarketDataHandler::new(Arc::new(broadcast));

        assert!(!handler.on_tick(&RawEvent::new(json!({"close": 1.0}))));
        assert!(!handler.on_bid_ask(&RawEvent::new(json!([1, 2]))));
        assert_eq!(handler.stats().tick.malformed, 1);
        assert_eq!(handler.stats().bid_ask.malformed, 1);
    }

    #[test]
    fn snapshot_batch_skips_malformed_entry() {
        let hub = Arc::new(BroadcastHub::with_defaults());
        let mut rx = hub.subscribe();
        let handler = MarketDataHandler::new(hub);

        let payload = SnapshotPayload::Batch(vec![
            RawEvent::new(json!({"code": "TXO17900C", "close": 310.0})),
            RawEvent::new(json!({"close": 250.0})),
            RawEvent::new(json!({"code": "TXO18100C", "close": 190.0})),
        ]);
        assert_eq!(handler.on_snapshot(payload), 2);

        let codes: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|event| event.contract_code().map(ToOwned::to_owned))
            .collect();
        assert_eq!(codes, vec!["TXO17900C", "TXO18100C"]);

        let stats = handler.stats().snapshot;
        assert_eq!(stats.received, 3);
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn queue_full_counts_as_drop() {
        let mut broadcast = MockBroadcastPort::new();
        broadcast.expect_is_connected().return_const(true);
        broadcast
            .expect_emit()
            .times(1)
            .returning(|_| Err(BroadcastError::QueueFull));
        let handler = MarketDataHandler::new(Arc::new(broadcast));

        assert!(!handler.on_bid_ask(&RawEvent::new(json!({"code": "TXO18000P"}))));
        assert_eq!(handler.stats().bid_ask.dropped, 1);
        assert_eq!(handler.stats().bid_ask.failed, 0);
    }

    #[test]
    fn transport_error_counts_as_failure() {
        let mut broadcast = MockBroadcastPort::new();
        broadcast.expect_is_connected().return_const(true);
        broadcast
            .expect_emit()
            .returning(|_| Err(BroadcastError::Serialization("bad".to_string())));
        let handler = MarketDataHandler::new(Arc::new(broadcast));

        assert!(!handler.on_fault("subscribe failed", Some("TXO18000C")));
        assert_eq!(handler.stats().fault.failed, 1);
    }

    #[test]
    fn fault_carries_service_and_contract() {
        let hub = Arc::new(BroadcastHub::with_defaults());
        let mut rx = hub.subscribe();
        let handler = MarketDataHandler::new(hub);

        assert!(handler.on_fault("snapshot timed out", Some("TXO18000C")));
        let Ok(OutboundEvent::Fault(record)) = rx.try_recv() else {
            panic!("expected a fault");
        };
        assert_eq!(record.service, SERVICE_NAME);
        assert_eq!(record.contract.as_deref(), Some("TXO18000C"));
        assert_eq!(record.error, "snapshot timed out");
    }
}
