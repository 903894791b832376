//! Market Data Streaming Types
//!
//! Raw upstream events, the normalized records built from them, and the
//! outbound events the relay broadcasts.

mod events;
mod raw;
mod records;

pub use events::{EventKind, OutboundEvent};
pub use raw::RawEvent;
pub use records::{
    BidAskRecord, ExtractError, FaultRecord, HeartbeatRecord, ReadyRecord, SnapshotRecord,
    TickRecord,
};
