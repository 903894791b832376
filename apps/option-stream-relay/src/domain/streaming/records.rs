//! Normalized, broadcast-ready records.
//!
//! Every market field is independently optional and serializes as `null`
//! when unavailable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::raw::RawEvent;

/// Reason a raw event could not be normalized at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The event is not a key/value document.
    #[error("event is not an object")]
    NotAnObject,
    /// The event carries no usable contract code.
    #[error("event has no contract code")]
    MissingCode,
}

const PERCENT_SCALE: u32 = 4;

// =============================================================================
// Tick
// =============================================================================

/// Normalized trade tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickRecord {
    /// Contract code.
    pub code: String,
    /// Exchange identifier.
    pub exchange: Option<String>,
    /// Exchange-side event time as reported.
    pub datetime: Option<String>,
    /// Session open.
    pub open: Option<Decimal>,
    /// Session high.
    pub high: Option<Decimal>,
    /// Session low.
    pub low: Option<Decimal>,
    /// Last trade price.
    pub close: Option<Decimal>,
    /// Alias of `close` kept for consumers that read `price`.
    pub price: Option<Decimal>,
    /// Last trade volume.
    pub volume: Option<i64>,
    /// Cumulative session volume.
    pub total_volume: Option<i64>,
    /// `close - open`.
    pub change: Option<Decimal>,
    /// `change / open * 100`.
    pub change_percent: Option<Decimal>,
    /// Time the relay normalized the event.
    pub timestamp: DateTime<Utc>,
}

impl TickRecord {
    /// Normalize a raw tick.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError` if the event is not an object or has no code.
    pub fn from_raw(raw: &RawEvent, received_at: DateTime<Utc>) -> Result<Self, ExtractError> {
        let code = require_code(raw)?;
        let open = raw.decimal("open");
        let close = raw.decimal("close");
        let (change, change_percent) = change_from_open(open, close);

        Ok(Self {
            code,
            exchange: raw.text("exchange"),
            datetime: raw.text("datetime"),
            open,
            high: raw.decimal("high"),
            low: raw.decimal("low"),
            close,
            price: close,
            volume: raw.integer("volume"),
            total_volume: raw.integer("total_volume"),
            change,
            change_percent,
            timestamp: received_at,
        })
    }
}

// =============================================================================
// Bid / Ask
// =============================================================================

/// Normalized order book update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidAskRecord {
    /// Contract code.
    pub code: String,
    /// Exchange identifier.
    pub exchange: Option<String>,
    /// Exchange-side event time as reported.
    pub datetime: Option<String>,
    /// Bid prices, best first.
    pub bid_price: Option<Vec<Decimal>>,
    /// Bid volumes, aligned with `bid_price`.
    pub bid_volume: Option<Vec<i64>>,
    /// Ask prices, best first.
    pub ask_price: Option<Vec<Decimal>>,
    /// Ask volumes, aligned with `ask_price`.
    pub ask_volume: Option<Vec<i64>>,
    /// Best bid.
    pub best_bid: Option<Decimal>,
    /// Best ask.
    pub best_ask: Option<Decimal>,
    /// `best_ask - best_bid`.
    pub spread: Option<Decimal>,
    /// Midpoint of best bid and ask.
    pub mid_price: Option<Decimal>,
    /// Time the relay normalized the event.
    pub timestamp: DateTime<Utc>,
}

impl BidAskRecord {
    /// Normalize a raw bid/ask update.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError` if the event is not an object or has no code.
    pub fn from_raw(raw: &RawEvent, received_at: DateTime<Utc>) -> Result<Self, ExtractError> {
        let code = require_code(raw)?;
        let bid_price = raw.decimal_list("bid_price");
        let ask_price = raw.decimal_list("ask_price");

        // A zero level means the side is empty.
        let best_bid = best_level(bid_price.as_deref());
        let best_ask = best_level(ask_price.as_deref());
        let (spread, mid_price) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => (
                ask.checked_sub(bid),
                bid.checked_add(ask)
                    .and_then(|sum| sum.checked_div(Decimal::TWO)),
            ),
            _ => (None, None),
        };

        Ok(Self {
            code,
            exchange: raw.text("exchange"),
            datetime: raw.text("datetime"),
            bid_price,
            bid_volume: raw.integer_list("bid_volume"),
            ask_price,
            ask_volume: raw.integer_list("ask_volume"),
            best_bid,
            best_ask,
            spread,
            mid_price,
            timestamp: received_at,
        })
    }
}

fn best_level(levels: Option<&[Decimal]>) -> Option<Decimal> {
    levels?.first().copied().filter(|p| *p > Decimal::ZERO)
}

// =============================================================================
// Snapshot
// =============================================================================

/// Normalized point-in-time snapshot of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    /// Contract code.
    pub code: String,
    /// Display name.
    pub name: Option<String>,
    /// Exchange-side snapshot time in epoch nanoseconds.
    pub ts: Option<i64>,
    /// Session open.
    pub open: Option<Decimal>,
    /// Session high.
    pub high: Option<Decimal>,
    /// Session low.
    pub low: Option<Decimal>,
    /// Last price.
    pub close: Option<Decimal>,
    /// Last trade volume.
    pub volume: Option<i64>,
    /// Traded amount.
    pub amount: Option<Decimal>,
    /// Cumulative session volume.
    pub total_volume: Option<i64>,
    /// Best bid.
    pub buy_price: Option<Decimal>,
    /// Best ask.
    pub sell_price: Option<Decimal>,
    /// Reported change rate, or `(close - open) / open * 100`.
    pub change_percent: Option<Decimal>,
    /// Time the relay normalized the snapshot.
    pub timestamp: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Normalize a raw snapshot entry.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError` if the entry is not an object or has no code.
    pub fn from_raw(raw: &RawEvent, received_at: DateTime<Utc>) -> Result<Self, ExtractError> {
        let code = require_code(raw)?;
        let open = raw.decimal("open");
        let close = raw.decimal("close");
        let change_percent = raw
            .decimal("change_rate")
            .or_else(|| change_from_open(open, close).1);

        Ok(Self {
            code,
            name: raw.text("name"),
            ts: raw.integer("ts"),
            open,
            high: raw.decimal("high"),
            low: raw.decimal("low"),
            close,
            volume: raw.integer("volume"),
            amount: raw.decimal("amount"),
            total_volume: raw.integer("total_volume"),
            buy_price: raw.decimal("buy_price"),
            sell_price: raw.decimal("sell_price"),
            change_percent,
            timestamp: received_at,
        })
    }
}

// =============================================================================
// Service Records
// =============================================================================

/// Liveness record emitted on the heartbeat cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatRecord {
    /// Always `running` while the loops are alive.
    pub status: &'static str,
    /// Upstream trading session connected.
    pub upstream_connected: bool,
    /// Downstream broadcast connected.
    pub downstream_connected: bool,
    /// Last known underlying price.
    pub current_price: Option<Decimal>,
    /// True when `current_price` is not from the most recent accepted update.
    pub price_stale: bool,
    /// Number of subscribed contracts.
    pub subscribed_count: usize,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

/// Fault notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    /// Error description.
    pub error: String,
    /// Service that raised the fault.
    pub service: &'static str,
    /// Contract involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

/// Emitted once when the relay enters the running state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyRecord {
    /// Always `ready`.
    pub status: &'static str,
    /// Whether the upstream session is simulated.
    pub simulation: bool,
    /// Relay version.
    pub version: String,
    /// Service role.
    pub service_type: &'static str,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Helpers
// =============================================================================

fn require_code(raw: &RawEvent) -> Result<String, ExtractError> {
    if !raw.is_object() {
        return Err(ExtractError::NotAnObject);
    }
    raw.text("code").ok_or(ExtractError::MissingCode)
}

fn change_from_open(
    open: Option<Decimal>,
    close: Option<Decimal>,
) -> (Option<Decimal>, Option<Decimal>) {
    let Some((open, close)) = open.zip(close) else {
        return (None, None);
    };
    let change = close.checked_sub(open);
    let percent = change
        .and_then(|c| c.checked_div(open))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|p| p.round_dp(PERCENT_SCALE));
    (change, percent)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn tick_full_extraction() {
        let raw = RawEvent::new(json!({
            "exchange": "TAIFEX",
            "code": "TXO18000C",
            "datetime": "2024-11-20 10:15:00.123",
            "open": 100,
            "high": 120,
            "low": 95,
            "close": 110,
            "volume": 3,
            "total_volume": 250,
        }));
        let tick = TickRecord::from_raw(&raw, now()).unwrap();

        assert_eq!(tick.code, "TXO18000C");
        assert_eq!(tick.exchange.as_deref(), Some("TAIFEX"));
        assert_eq!(tick.price, Some(Decimal::from(110)));
        assert_eq!(tick.change, Some(Decimal::from(10)));
        assert_eq!(tick.change_percent, Some(Decimal::from(10)));
        assert_eq!(tick.total_volume, Some(250));
    }

    #[test]
    fn tick_missing_fields_are_unavailable() {
        let raw = RawEvent::new(json!({"code": "TXO18000C", "close": "oops"}));
        let tick = TickRecord::from_raw(&raw, now()).unwrap();
        assert!(tick.close.is_none());
        assert!(tick.price.is_none());
        assert!(tick.volume.is_none());
        assert!(tick.change_percent.is_none());
    }

    #[test]
    fn tick_zero_open_does_not_divide() {
        let raw = RawEvent::new(json!({"code": "TXO18000C", "open": 0, "close": 5}));
        let tick = TickRecord::from_raw(&raw, now()).unwrap();
        assert_eq!(tick.change, Some(Decimal::from(5)));
        assert!(tick.change_percent.is_none());
    }

    #[test]
    fn tick_without_code_is_rejected() {
        let raw = RawEvent::new(json!({"close": 5}));
        assert_eq!(
            TickRecord::from_raw(&raw, now()),
            Err(ExtractError::MissingCode)
        );
        assert_eq!(
            TickRecord::from_raw(&RawEvent::new(json!("tick")), now()),
            Err(ExtractError::NotAnObject)
        );
    }

    #[test]
    fn bidask_derives_spread_and_mid() {
        let raw = RawEvent::new(json!({
            "code": "TXO18000C",
            "bid_price": [100, 99.5],
            "bid_volume": [5, 7],
            "ask_price": [101, 101.5],
            "ask_volume": [3, 4],
        }));
        let record = BidAskRecord::from_raw(&raw, now()).unwrap();
        assert_eq!(record.best_bid, Some(Decimal::from(100)));
        assert_eq!(record.best_ask, Some(Decimal::from(101)));
        assert_eq!(record.spread, Some(Decimal::ONE));
        assert_eq!(record.mid_price, Some(Decimal::new(1005, 1)));
        assert_eq!(record.bid_volume, Some(vec![5, 7]));
    }

    #[test]
    fn bidask_empty_side_has_no_derived_fields() {
        let raw = RawEvent::new(json!({
            "code": "TXO18000C",
            "bid_price": [0, 0],
            "ask_price": [101],
        }));
        let record = BidAskRecord::from_raw(&raw, now()).unwrap();
        assert!(record.best_bid.is_none());
        assert_eq!(record.best_ask, Some(Decimal::from(101)));
        assert!(record.spread.is_none());
        assert!(record.mid_price.is_none());
    }

    #[test]
    fn snapshot_prefers_reported_change_rate() {
        let raw = RawEvent::new(json!({
            "code": "TXO18000C",
            "open": 100,
            "close": 110,
            "change_rate": 9.5,
            "ts": 1_700_000_000_000_000_000_i64,
        }));
        let record = SnapshotRecord::from_raw(&raw, now()).unwrap();
        assert_eq!(record.change_percent, Some(Decimal::new(95, 1)));
        assert_eq!(record.ts, Some(1_700_000_000_000_000_000));

        let raw = RawEvent::new(json!({"code": "TXO18000C", "open": 100, "close": 110}));
        let record = SnapshotRecord::from_raw(&raw, now()).unwrap();
        assert_eq!(record.change_percent, Some(Decimal::from(10)));
    }

    #[test]
    fn records_serialize_unavailable_as_null() {
        let raw = RawEvent::new(json!({"code": "TXO18000C", "close": 12.5}));
        let tick = TickRecord::from_raw(&raw, now()).unwrap();
        let value = serde_json::to_value(&tick).unwrap();

        assert_eq!(value["code"], "TXO18000C");
        assert_eq!(value["close"], json!(12.5));
        assert!(value["open"].is_null());
        assert!(value["volume"].is_null());
    }

    #[test]
    fn fault_record_omits_missing_contract() {
        let fault = FaultRecord {
            error: "boom".to_string(),
            service: "market_data",
            contract: None,
            timestamp: now(),
        };
        let value = serde_json::to_value(&fault).unwrap();
        assert!(value.get("contract").is_none());
        assert_eq!(value["service"], "market_data");
    }
}
