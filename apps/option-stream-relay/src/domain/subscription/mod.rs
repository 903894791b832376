//! Subscription Tracking Types
//!
//! Domain types for the set of contracts currently subscribed upstream and
//! the diff that reconciles it against a target set.
//!
//! # Design
//!
//! The set is keyed by contract code. A diff is computed in one pass:
//! - contracts in the target but not in the set are subscribed
//! - contracts in the set but not in the target are unsubscribed
//!
//! Applying a diff never aborts halfway: each contract's result is recorded
//! individually in a [`ReconcileOutcome`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::contract::Contract;

// =============================================================================
// Subscription Changes
// =============================================================================

/// Contracts to subscribe and unsubscribe, in code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Contracts to subscribe to.
    pub subscribe: Vec<Contract>,
    /// Contracts to unsubscribe from.
    pub unsubscribe: Vec<Contract>,
}

impl SubscriptionChanges {
    /// Check if there are any changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Contracts currently subscribed upstream.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    contracts: BTreeMap<String, Contract>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the changes that turn this set into `targets`.
    ///
    /// Duplicate targets collapse to one entry.
    #[must_use]
    pub fn diff(&self, targets: &[Contract]) -> SubscriptionChanges {
        let wanted: BTreeMap<&str, &Contract> =
            targets.iter().map(|c| (c.code(), c)).collect();

        let subscribe = wanted
            .iter()
            .filter(|(code, _)| !self.contracts.contains_key(**code))
            .map(|(_, contract)| (*contract).clone())
            .collect();

        let unsubscribe = self
            .contracts
            .iter()
            .filter(|(code, _)| !wanted.contains_key(code.as_str()))
            .map(|(_, contract)| contract.clone())
            .collect();

        SubscriptionChanges {
            subscribe,
            unsubscribe,
        }
    }

    /// Record a contract as subscribed.
    pub fn insert(&mut self, contract: Contract) {
        self.contracts.insert(contract.code().to_string(), contract);
    }

    /// Forget a contract. Returns true if it was present.
    pub fn remove(&mut self, code: &str) -> bool {
        self.contracts.remove(code).is_some()
    }

    /// Remove and return every contract.
    pub fn drain(&mut self) -> Vec<Contract> {
        std::mem::take(&mut self.contracts).into_values().collect()
    }

    /// Check whether a contract code is subscribed.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.contracts.contains_key(code)
    }

    /// Subscribed contracts in code order.
    #[must_use]
    pub fn contracts(&self) -> Vec<Contract> {
        self.contracts.values().cloned().collect()
    }

    /// Subscribed contract codes in order.
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        self.contracts.keys().cloned().collect()
    }

    /// Number of subscribed contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Check if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

// =============================================================================
// Reconcile Outcome
// =============================================================================

/// Upstream operation that failed for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionOperation {
    /// Subscribe call.
    Subscribe,
    /// Unsubscribe call.
    Unsubscribe,
}

impl SubscriptionOperation {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for SubscriptionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contract's failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFailure {
    /// The contract that failed.
    pub contract: Contract,
    /// Which operation failed.
    pub operation: SubscriptionOperation,
    /// Error description.
    pub reason: String,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Contracts newly subscribed.
    pub subscribed: Vec<Contract>,
    /// Contracts unsubscribed.
    pub unsubscribed: Vec<Contract>,
    /// Contracts whose subscribe or unsubscribe failed.
    pub failed: Vec<ContractFailure>,
}

impl ReconcileOutcome {
    /// Check if the pass changed nothing and failed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.subscribed.is_empty() && self.unsubscribed.is_empty() && self.failed.is_empty()
    }

    /// Codes of newly subscribed contracts.
    #[must_use]
    pub fn subscribed_codes(&self) -> Vec<&str> {
        self.subscribed.iter().map(Contract::code).collect()
    }

    /// Codes of unsubscribed contracts.
    #[must_use]
    pub fn unsubscribed_codes(&self) -> Vec<&str> {
        self.unsubscribed.iter().map(Contract::code).collect()
    }

    /// Codes of failed contracts.
    #[must_use]
    pub fn failed_codes(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.contract.code()).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
