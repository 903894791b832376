//! Raw upstream events and tolerant field access.
//!
//! Upstream payloads arrive as loosely typed key/value documents. Every
//! accessor here returns `None` instead of failing when a field is absent,
//! null, or of the wrong type.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// A raw event as delivered by the trading session.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent(Value);

impl RawEvent {
    /// Wrap an arbitrary JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Build an event from key/value pairs.
    #[must_use]
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map: Map<String, Value> = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self(Value::Object(map))
    }

    /// Underlying JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Whether the event is a key/value document at all.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// Raw field, treating `null` as absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.as_object()?.get(name).filter(|v| !v.is_null())
    }

    /// Non-empty text field. Numbers are rendered to text.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Decimal field from a JSON number or a numeric string.
    #[must_use]
    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        value_to_decimal(self.field(name)?)
    }

    /// Integer field. Accepts integral floats and numeric strings.
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        value_to_integer(self.field(name)?)
    }

    /// List of decimals. A scalar is treated as a one-element list; any
    /// non-numeric element makes the whole list unavailable.
    #[must_use]
    pub fn decimal_list(&self, name: &str) -> Option<Vec<Decimal>> {
        match self.field(name)? {
            Value::Array(items) => items.iter().map(value_to_decimal).collect(),
            scalar => value_to_decimal(scalar).map(|d| vec![d]),
        }
    }

    /// List of integers, with the same rules as [`Self::decimal_list`].
    #[must_use]
    pub fn integer_list(&self, name: &str) -> Option<Vec<i64>> {
        match self.field(name)? {
            Value::Array(items) => items.iter().map(value_to_integer).collect(),
            scalar => value_to_integer(scalar).map(|i| vec![i]),
        }
    }
}

impl From<Value> for RawEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                parse_decimal(&n.to_string())
            }
        }
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn value_to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let d = parse_decimal(&n.to_string())?;
            if d.fract().is_zero() {
                i64::try_from(d).ok()
            } else {
                None
            }
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
