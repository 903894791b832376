//! Underlying Price State
//!
//! Single source of truth for the latest underlying price. Written by the
//! feed pumps, read by the subscription-refresh loop and the heartbeat.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

/// Price signal delivered by the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSignal {
    /// A price value as reported. Non-positive values are rejected.
    Value(Decimal),
    /// The source explicitly reports that no price is available.
    Unavailable,
}

impl From<Option<Decimal>> for PriceSignal {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Self::Unavailable, Self::Value)
    }
}

/// Outcome of applying a [`PriceSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUpdate {
    /// The value was accepted and the state is valid.
    Accepted,
    /// A non-positive value was rejected; the last value is kept but stale.
    Rejected,
    /// The source reported no price; the value was cleared.
    Cleared,
}

/// Point-in-time copy of [`PriceState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceSnapshot {
    /// Latest value, possibly stale.
    pub value: Option<Decimal>,
    /// When the state last changed.
    pub updated_at: Option<DateTime<Utc>>,
    /// True iff `value` came from the most recent update and is positive.
    pub valid: bool,
}

impl PriceSnapshot {
    /// The value, only while it is valid.
    #[must_use]
    pub fn valid_value(&self) -> Option<Decimal> {
        if self.valid { self.value } else { None }
    }
}

/// Lock-protected price holder.
#[derive(Debug, Default)]
pub struct PriceState {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    value: Option<Decimal>,
    updated_at: Option<DateTime<Utc>>,
    valid: bool,
}

impl PriceState {
    /// Create an empty, invalid state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a price signal.
    pub fn update(&self, signal: PriceSignal) -> PriceUpdate {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        inner.updated_at = Some(now);
        match signal {
            PriceSignal::Value(price) if price > Decimal::ZERO => {
                inner.value = Some(price);
                inner.valid = true;
                PriceUpdate::Accepted
            }
            PriceSignal::Value(_) => {
                inner.valid = false;
                PriceUpdate::Rejected
            }
            PriceSignal::Unavailable => {
                inner.value = None;
                inner.valid = false;
                PriceUpdate::Cleared
            }
        }
    }

    /// Consistent copy of value, timestamp and validity.
    #[must_use]
    pub fn snapshot(&self) -> PriceSnapshot {
        let inner = self.inner.lock();
        PriceSnapshot {
            value: inner.value,
            updated_at: inner.updated_at,
            valid: inner.valid,
        }
    }

    /// Whether the current value may drive subscription changes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.lock().valid
    }
}
