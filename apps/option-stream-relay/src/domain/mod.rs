//! Domain Layer - Core relay types and business rules.
//!
//! Pure types with no I/O: contract identity and strike arithmetic, the
//! shared price state, subscription bookkeeping, and market data records.

/// Contract identity and strike ladder.
pub mod contract;

/// Underlying price state.
pub mod price;

/// Market data records and outbound events.
pub mod streaming;

/// Subscription set and reconciliation results.
pub mod subscription;
