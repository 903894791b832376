//! Contract Catalog Port (Driven Port)
//!
//! Read-only view of the contracts tradable in the current session.

use crate::domain::contract::{Contract, ContractKey};

/// Lookup of contracts by `(strike, option type)`.
///
/// Lookups never fail: an absent or unusable entry is simply not found.
#[cfg_attr(test, mockall::automock)]
pub trait ContractCatalog: Send + Sync {
    /// Find the contract for a key.
    fn lookup(&self, key: &ContractKey) -> Option<Contract>;

    /// Number of usable contracts.
    fn len(&self) -> usize;

    /// Check if the catalog has no usable contracts.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
