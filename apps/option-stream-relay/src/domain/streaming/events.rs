//! Outbound events and their wire names.

use serde_json::Value;

use super::records::{
    BidAskRecord, FaultRecord, HeartbeatRecord, ReadyRecord, SnapshotRecord, TickRecord,
};

/// Kind of outbound event, used for counters and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Trade tick.
    Tick,
    /// Bid/ask update.
    BidAsk,
    /// Contract snapshot.
    Snapshot,
    /// Relay heartbeat.
    Heartbeat,
    /// Fault notification.
    Fault,
    /// Relay ready notice.
    Ready,
}

impl EventKind {
    /// Market data kinds handled by the normalizer.
    pub const MARKET: [Self; 3] = [Self::Tick, Self::BidAsk, Self::Snapshot];

    /// Event name on the wire, as existing gateway consumers expect it.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Tick => "market_tick",
            Self::BidAsk => "market_bidask",
            Self::Snapshot => "market_snapshot",
            Self::Heartbeat => "heartbeat",
            Self::Fault => "python_error",
            Self::Ready => "shioaji_ready",
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::BidAsk => "bidask",
            Self::Snapshot => "snapshot",
            Self::Heartbeat => "heartbeat",
            Self::Fault => "fault",
            Self::Ready => "ready",
        }
    }
}

/// A record ready for the broadcast transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// `market_tick`.
    Tick(TickRecord),
    /// `market_bidask`.
    BidAsk(BidAskRecord),
    /// `market_snapshot`.
    Snapshot(SnapshotRecord),
    /// `heartbeat`.
    Heartbeat(HeartbeatRecord),
    /// `python_error`.
    Fault(FaultRecord),
    /// `shioaji_ready`.
    Ready(ReadyRecord),
}

impl OutboundEvent {
    /// Event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Tick(_) => EventKind::Tick,
            Self::BidAsk(_) => EventKind::BidAsk,
            Self::Snapshot(_) => EventKind::Snapshot,
            Self::Heartbeat(_) => EventKind::Heartbeat,
            Self::Fault(_) => EventKind::Fault,
            Self::Ready(_) => EventKind::Ready,
        }
    }

    /// Event name on the wire, as existing gateway consumers expect it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().event_name()
    }

    /// Contract code the event concerns, if any.
    #[must_use]
    pub fn contract_code(&self) -> Option<&str> {
        match self {
            Self::Tick(r) => Some(&r.code),
            Self::BidAsk(r) => Some(&r.code),
            Self::Snapshot(r) => Some(&r.code),
            Self::Fault(r) => r.contract.as_deref(),
            Self::Heartbeat(_) | Self::Ready(_) => None,
        }
    }

    /// Serialize the record body.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the record cannot be represented.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Tick(r) => serde_json::to_value(r),
            Self::BidAsk(r) => serde_json::to_value(r),
            Self::Snapshot(r) => serde_json::to_value(r),
            Self::Heartbeat(r) => serde_json::to_value(r),
            Self::Fault(r) => serde_json::to_value(r),
            Self::Ready(r) => serde_json::to_value(r),
        }
    }

    /// Encode as a `{"event": ..., "data": ...}` text frame.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the record cannot be represented.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let frame = serde_json::json!({
            "event": self.name(),
            "data": self.payload()?,
        });
        serde_json::to_string(&frame)
    }
}
