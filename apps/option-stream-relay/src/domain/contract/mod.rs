//! Contract Types and Strike Arithmetic
//!
//! Option contract identity, the `(strike, option type)` lookup key, and the
//! strike ladder used to pick the at-the-money window.
//!
//! # Strike Ladder
//!
//! ```text
//! price 18050, interval 100, range 1
//!
//!   remainder = 50 >= 100 / 2  → ATM 18100
//!   strikes   = [18000, 18100, 18200]
//! ```

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Option Type
// =============================================================================

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionType {
    /// Single-letter suffix used in exchange contract codes.
    #[must_use]
    pub const fn code_suffix(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }

    /// Parse the option right from the spellings found in catalog data.
    ///
    /// Accepts `C`/`P`, `call`/`put` in any case, and enum-style values such
    /// as `OptionRight.Call`.
    #[must_use]
    pub fn parse_loose(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let tail = trimmed.rsplit('.').next().unwrap_or(trimmed);
        match tail.to_ascii_lowercase().as_str() {
            "c" | "call" => Some(Self::Call),
            "p" | "put" => Some(Self::Put),
            _ => None,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Contract Key
// =============================================================================

/// Catalog lookup key: `(strike, option type)`.
///
/// Strikes are normalized on construction so `18000` and `18000.0` are the
/// same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractKey {
    strike: Decimal,
    option_type: OptionType,
}

impl ContractKey {
    /// Create a new key.
    #[must_use]
    pub fn new(strike: Decimal, option_type: OptionType) -> Self {
        Self {
            strike: strike.normalize(),
            option_type,
        }
    }

    /// Strike price.
    #[must_use]
    pub const fn strike(&self) -> Decimal {
        self.strike
    }

    /// Option right.
    #[must_use]
    pub const fn option_type(&self) -> OptionType {
        self.option_type
    }

    /// Render the exchange-style contract code, e.g. `TXO18000C`.
    #[must_use]
    pub fn code(&self, root: &str) -> String {
        format!("{root}{}{}", self.strike, self.option_type.code_suffix())
    }

    /// Parse an exchange-style contract code back into a key.
    ///
    /// Returns `None` when the code does not start with `root`, lacks a
    /// `C`/`P` suffix, or carries a non-positive strike.
    #[must_use]
    pub fn parse_code(root: &str, code: &str) -> Option<Self> {
        let body = code.strip_prefix(root)?;
        let suffix = body.chars().last()?;
        let option_type = match suffix {
            'C' => OptionType::Call,
            'P' => OptionType::Put,
            _ => return None,
        };
        let strike: Decimal = body[..body.len() - 1].parse().ok()?;
        if strike <= Decimal::ZERO {
            return None;
        }
        Some(Self::new(strike, option_type))
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.strike, self.option_type.code_suffix())
    }
}

// =============================================================================
// Contract
// =============================================================================

/// An option contract as resolved from the session catalog.
///
/// Immutable once built; the subscription engine only ever holds clones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contract {
    code: String,
    strike: Decimal,
    option_type: OptionType,
    expiry: Option<String>,
    underlying: Option<String>,
}

impl Contract {
    /// Create a contract with its identity fields.
    #[must_use]
    pub fn new(code: impl Into<String>, strike: Decimal, option_type: OptionType) -> Self {
        Self {
            code: code.into(),
            strike: strike.normalize(),
            option_type,
            expiry: None,
            underlying: None,
        }
    }

    /// Set the expiry marker (delivery month or date).
    #[must_use]
    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    /// Set the underlying symbol.
    #[must_use]
    pub fn with_underlying(mut self, underlying: impl Into<String>) -> Self {
        self.underlying = Some(underlying.into());
        self
    }

    /// Exchange code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Strike price.
    #[must_use]
    pub const fn strike(&self) -> Decimal {
        self.strike
    }

    /// Option right.
    #[must_use]
    pub const fn option_type(&self) -> OptionType {
        self.option_type
    }

    /// Expiry marker, if the catalog supplied one.
    #[must_use]
    pub fn expiry(&self) -> Option<&str> {
        self.expiry.as_deref()
    }

    /// Underlying symbol, if the catalog supplied one.
    #[must_use]
    pub fn underlying(&self) -> Option<&str> {
        self.underlying.as_deref()
    }

    /// Lookup key for this contract.
    #[must_use]
    pub fn key(&self) -> ContractKey {
        ContractKey::new(self.strike, self.option_type)
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

// =============================================================================
// Strike Ladder
// =============================================================================

/// Strike spacing and ATM window width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeLadder {
    interval: Decimal,
    range: u32,
}

impl StrikeLadder {
    /// Create a ladder.
    ///
    /// # Errors
    ///
    /// Returns `StrikeLadderError::NonPositiveInterval` if `interval <= 0`.
    pub fn new(interval: Decimal, range: u32) -> Result<Self, StrikeLadderError> {
        if interval <= Decimal::ZERO {
            return Err(StrikeLadderError::NonPositiveInterval(interval));
        }
        Ok(Self { interval, range })
    }

    /// Strike spacing.
    #[must_use]
    pub const fn interval(&self) -> Decimal {
        self.interval
    }

    /// Number of strikes on each side of the ATM strike.
    #[must_use]
    pub const fn range(&self) -> u32 {
        self.range
    }

    /// Number of strikes in the window (`2 * range + 1`).
    #[must_use]
    pub const fn width(&self) -> usize {
        2 * self.range as usize + 1
    }

    /// Nearest strike boundary to `price`.
    ///
    /// A remainder of at least half an interval rounds up, so the midpoint
    /// itself rounds up.
    #[must_use]
    pub fn compute_atm(&self, price: Decimal) -> Decimal {
        let mut remainder = price % self.interval;
        if remainder < Decimal::ZERO {
            remainder += self.interval;
        }
        let lower = price - remainder;
        let atm = if remainder >= self.interval - remainder {
            lower.checked_add(self.interval).unwrap_or(lower)
        } else {
            lower
        };
        atm.normalize()
    }

    /// Strikes centred on `atm`, strictly ascending, `2 * range + 1` long.
    ///
    /// Strikes outside the representable decimal range are left out.
    #[must_use]
    pub fn target_strikes(&self, atm: Decimal) -> Vec<Decimal> {
        let range = i64::from(self.range);
        (-range..=range)
            .filter_map(|offset| {
                self.interval
                    .checked_mul(Decimal::from(offset))
                    .and_then(|step| atm.checked_add(step))
            })
            .map(|strike| strike.normalize())
            .collect()
    }
}

/// Strike ladder construction error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrikeLadderError {
    /// Interval must be strictly positive.
    #[error("strike interval must be positive, got {0}")]
    NonPositiveInterval(Decimal),
}

// =============================================================================
// Tests
// =============================================================================
