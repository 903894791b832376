//! Contract Manager
//!
//! Keeps the upstream subscriptions centred on the at-the-money strike.
//!
//! # Reconciliation
//!
//! Each pass diffs the current [`SubscriptionSet`] against a target list and
//! applies the difference contract by contract:
//!
//! 1. Unsubscribe contracts that left the window. The contract leaves the set
//!    even when the call fails, so a broken contract is not retried forever.
//! 2. Subscribe contracts that entered the window, tick stream first, then
//!    bid/ask. If the second kind fails the first is rolled back and the
//!    contract stays out of the set.
//!
//! Passes are serialized; the set lock is never held across a session call.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::application::ports::{ContractCatalog, QuoteKind, SessionError, TradingSession};
use crate::domain::contract::{Contract, ContractKey, OptionType, StrikeLadder};
use crate::domain::price::PriceSnapshot;
use crate::domain::subscription::{
    ContractFailure, ReconcileOutcome, SubscriptionOperation, SubscriptionSet,
};
use crate::infrastructure::metrics;

/// Contract manager settings.
#[derive(Debug, Clone)]
pub struct ContractManagerConfig {
    /// Strike spacing and window width.
    pub ladder: StrikeLadder,
    /// Rights to subscribe at every strike.
    pub option_types: Vec<OptionType>,
    /// Deadline for a single session call.
    pub call_timeout: Duration,
}

/// Target contracts for one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSelection {
    /// At-the-money strike.
    pub atm: Decimal,
    /// Strikes in the window, ascending.
    pub strikes: Vec<Decimal>,
    /// Contracts found in the catalog, by strike then right.
    pub contracts: Vec<Contract>,
    /// `(strike, right)` pairs the catalog does not list.
    pub unresolved: Vec<ContractKey>,
}

/// What a refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshResult {
    /// Price is missing or stale; subscriptions left untouched.
    Frozen,
    /// No target contract could be resolved; subscriptions left untouched.
    NoTargets {
        /// At-the-money strike that was attempted.
        atm: Decimal,
    },
    /// A reconciliation pass ran.
    Reconciled {
        /// At-the-money strike used.
        atm: Decimal,
        /// Per-contract results.
        outcome: ReconcileOutcome,
    },
}

impl RefreshResult {
    /// Per-contract results, if a pass ran.
    #[must_use]
    pub const fn outcome(&self) -> Option<&ReconcileOutcome> {
        match self {
            Self::Reconciled { outcome, .. } => Some(outcome),
            Self::Frozen | Self::NoTargets { .. } => None,
        }
    }
}

/// Manages the near-the-money subscription window.
pub struct ContractManager {
    session: Arc<dyn TradingSession>,
    catalog: Arc<dyn ContractCatalog>,
    config: ContractManagerConfig,
    subscriptions: RwLock<SubscriptionSet>,
    last_atm: Mutex<Option<Decimal>>,
    pass: tokio::sync::Mutex<()>,
}

impl ContractManager {
    /// Create a manager with an empty subscription set.
    #[must_use]
    pub fn new(
        session: Arc<dyn TradingSession>,
        catalog: Arc<dyn ContractCatalog>,
        config: ContractManagerConfig,
    ) -> Self {
        Self {
            session,
            catalog,
            config,
            subscriptions: RwLock::new(SubscriptionSet::new()),
            last_atm: Mutex::new(None),
            pass: tokio::sync::Mutex::new(()),
        }
    }

    // =========================================================================
    // Target Selection
    // =========================================================================

    /// At-the-money strike for a price.
    #[must_use]
    pub fn compute_atm(&self, price: Decimal) -> Decimal {
        self.config.ladder.compute_atm(price)
    }

    /// Strikes in the window around `atm`.
    ///
    /// Non-positive strikes stay in the window; they never resolve.
    #[must_use]
    pub fn target_strikes(&self, atm: Decimal) -> Vec<Decimal> {
        self.config.ladder.target_strikes(atm)
    }

    /// Catalog lookup for one strike and right.
    #[must_use]
    pub fn resolve(&self, strike: Decimal, option_type: OptionType) -> Option<Contract> {
        self.catalog.lookup(&ContractKey::new(strike, option_type))
    }

    /// Target contracts for `price`.
    #[must_use]
    pub fn select_targets(&self, price: Decimal) -> TargetSelection {
        let atm = self.compute_atm(price);
        let strikes = self.target_strikes(atm);
        let mut contracts = Vec::with_capacity(strikes.len() * self.config.option_types.len());
        let mut unresolved = Vec::new();

        for strike in &strikes {
            for option_type in &self.config.option_types {
                match self.resolve(*strike, *option_type) {
                    Some(contract) => contracts.push(contract),
                    None => unresolved.push(ContractKey::new(*strike, *option_type)),
                }
            }
        }

        TargetSelection {
            atm,
            strikes,
            contracts,
            unresolved,
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Re-centre the window on the current price.
    pub async fn refresh(&self, price: &PriceSnapshot) -> RefreshResult {
        let Some(value) = price.valid_value() else {
            debug!(price = ?price.value, "Price not valid, subscriptions frozen");
            return RefreshResult::Frozen;
        };

        let selection = self.select_targets(value);
        if !selection.unresolved.is_empty() {
            debug!(
                atm = %selection.atm,
                unresolved = selection.unresolved.len(),
                "Some target contracts are not listed"
            );
        }
        if selection.contracts.is_empty() {
            warn!(
                atm = %selection.atm,
                strikes = selection.strikes.len(),
                "No target contracts found in catalog, keeping current subscriptions"
            );
            return RefreshResult::NoTargets { atm: selection.atm };
        }

        let previous = self.last_atm.lock().replace(selection.atm);
        if previous != Some(selection.atm) {
            info!(atm = %selection.atm, price = %value, previous = ?previous, "ATM strike moved");
        }

        let outcome = self.reconcile(&selection.contracts).await;
        RefreshResult::Reconciled {
            atm: selection.atm,
            outcome,
        }
    }

    /// Move the subscription set to exactly `targets`, contract by contract.
    pub async fn reconcile(&self, targets: &[Contract]) -> ReconcileOutcome {
        let _pass = self.pass.lock().await;
        let started = Instant::now();
        let changes = self.subscriptions.read().diff(targets);
        let mut outcome = ReconcileOutcome::default();

        if changes.is_empty() {
            return outcome;
        }

        for contract in changes.unsubscribe {
            let result = self.unsubscribe_contract(&contract).await;
            self.subscriptions.write().remove(contract.code());
            match result {
                Ok(()) => outcome.unsubscribed.push(contract),
                Err(error) => outcome.failed.push(self.failure(
                    contract,
                    SubscriptionOperation::Unsubscribe,
                    &error,
                )),
            }
        }

        for contract in changes.subscribe {
            match self.subscribe_contract(&contract).await {
                Ok(()) => {
                    self.subscriptions.write().insert(contract.clone());
                    outcome.subscribed.push(contract);
                }
                Err(error) => outcome.failed.push(self.failure(
                    contract,
                    SubscriptionOperation::Subscribe,
                    &error,
                )),
            }
        }

        let active = self.subscriptions.read().len();
        metrics::set_active_subscriptions(active);
        metrics::record_reconcile_duration(started.elapsed());

        info!(
            subscribed = ?outcome.subscribed_codes(),
            unsubscribed = ?outcome.unsubscribed_codes(),
            failed = ?outcome.failed_codes(),
            active,
            "Subscriptions reconciled"
        );
        outcome
    }

    /// Drop every subscription. The set ends empty whatever the session says.
    pub async fn unsubscribe_all(&self) -> ReconcileOutcome {
        let _pass = self.pass.lock().await;
        let contracts = self.subscriptions.write().drain();
        let mut outcome = ReconcileOutcome::default();

        for contract in contracts {
            match self.unsubscribe_contract(&contract).await {
                Ok(()) => outcome.unsubscribed.push(contract),
                Err(error) => outcome.failed.push(self.failure(
                    contract,
                    SubscriptionOperation::Unsubscribe,
                    &error,
                )),
            }
        }

        metrics::set_active_subscriptions(0);
        if !outcome.is_noop() {
            info!(
                unsubscribed = outcome.unsubscribed.len(),
                failed = outcome.failed.len(),
                "Unsubscribed all contracts"
            );
        }
        outcome
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Currently subscribed contracts, in code order.
    #[must_use]
    pub fn subscribed_contracts(&self) -> Vec<Contract> {
        self.subscriptions.read().contracts()
    }

    /// Currently subscribed codes, in code order.
    #[must_use]
    pub fn subscribed_codes(&self) -> Vec<String> {
        self.subscriptions.read().codes()
    }

    /// Number of subscribed contracts.
    #[must_use]
    pub fn subscribed_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// At-the-money strike of the last refresh that found targets.
    #[must_use]
    pub fn last_atm(&self) -> Option<Decimal> {
        *self.last_atm.lock()
    }

    /// Deadline applied to each session call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.config.call_timeout
    }

    // =========================================================================
    // Session Calls
    // =========================================================================

    async fn subscribe_contract(&self, contract: &Contract) -> Result<(), SessionError> {
        let mut done: Vec<QuoteKind> = Vec::with_capacity(QuoteKind::ALL.len());
        for kind in QuoteKind::ALL {
            let call = self.session.subscribe(contract, kind);
            if let Err(error) = with_timeout("subscribe", self.config.call_timeout, call).await {
                for subscribed in done {
                    let undo = self.session.unsubscribe(contract, subscribed);
                    if let Err(undo_error) =
                        with_timeout("unsubscribe", self.config.call_timeout, undo).await
                    {
                        debug!(
                            code = contract.code(),
                            kind = subscribed.as_str(),
                            error = %undo_error,
                            "Rollback unsubscribe failed"
                        );
                    }
                }
                return Err(error);
            }
            done.push(kind);
        }
        Ok(())
    }

    async fn unsubscribe_contract(&self, contract: &Contract) -> Result<(), SessionError> {
        let mut first_error = None;
        for kind in QuoteKind::ALL {
            let call = self.session.unsubscribe(contract, kind);
            if let Err(error) = with_timeout("unsubscribe", self.config.call_timeout, call).await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn failure(
        &self,
        contract: Contract,
        operation: SubscriptionOperation,
        error: &SessionError,
    ) -> ContractFailure {
        warn!(
            code = contract.code(),
            operation = operation.as_str(),
            error = %error,
            timeout_ms = self.config.call_timeout.as_millis(),
            "Subscription change failed"
        );
        metrics::record_subscription_failure(operation.as_str());
        ContractFailure {
            contract,
            operation,
            reason: error.to_string(),
        }
    }
}

/// Run a session call under a deadline.
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(SessionError::Timeout {
                operation,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::application::ports::MockContractCatalog;
    use crate::domain::price::{PriceSignal, PriceState};
    use crate::infrastructure::catalog::{CatalogEntry, SessionCatalog};
    use crate::infrastructure::session::{ScriptedOp, ScriptedSession, SessionCall};

    fn catalog() -> Arc<SessionCatalog> {
        let contracts = (170..=190).flat_map(|hundreds| {
            let strike = Decimal::from(hundreds * 100);
            [OptionType::Call, OptionType::Put].map(|right| {
                let key = ContractKey::new(strike, right);
                CatalogEntry::from(Contract::new(key.code("TXO"), strike, right))
            })
        });
        Arc::new(SessionCatalog::from_entries("TXO", contracts))
    }

    fn config(range: u32, option_types: Vec<OptionType>) -> ContractManagerConfig {
        ContractManagerConfig {
            ladder: StrikeLadder::new(Decimal::from(100), range).unwrap(),
            option_types,
            call_timeout: Duration::from_secs(1),
        }
    }

    async fn setup(range: u32) -> (Arc<ScriptedSession>, ContractManager) {
        let catalog = catalog();
        let session = Arc::new(ScriptedSession::new(catalog.clone()));
        session.connect().await.unwrap();
        let manager = ContractManager::new(
            session.clone(),
            catalog,
            config(range, vec![OptionType::Call]),
        );
        (session, manager)
    }

    fn calls(codes: &[u32]) -> Vec<Contract> {
        codes
            .iter()
            .map(|strike| {
                let strike = Decimal::from(*strike);
                Contract::new(
                    ContractKey::new(strike, OptionType::Call).code("TXO"),
                    strike,
                    OptionType::Call,
                )
            })
            .collect()
    }

    fn priced(value: i64) -> PriceSnapshot {
        let state = PriceState::new();
        state.update(PriceSignal::Value(Decimal::from(value)));
        state.snapshot()
    }

    #[test_case(18000, 18000 ; "on strike")]
    #[test_case(18049, 18000 ; "below midpoint")]
    #[test_case(18050, 18100 ; "midpoint rounds up")]
    #[test_case(18099, 18100 ; "just below next strike")]
    #[tokio::test]
    async fn atm_follows_price(price: i64, expected: i64) {
        let (_session, manager) = setup(2).await;
        assert_eq!(
            manager.compute_atm(Decimal::from(price)),
            Decimal::from(expected)
        );
    }

    #[tokio::test]
    async fn targets_cross_strikes_and_rights() {
        let catalog = catalog();
        let session = Arc::new(ScriptedSession::new(catalog.clone()));
        let manager = ContractManager::new(
            session,
            catalog,
            config(1, vec![OptionType::Call, OptionType::Put]),
        );

        let selection = manager.select_targets(Decimal::from(18020));
        assert_eq!(selection.atm, Decimal::from(18000));
        let codes: Vec<&str> = selection.contracts.iter().map(Contract::code).collect();
        assert_eq!(
            codes,
            vec![
                "TXO17900C",
                "TXO17900P",
                "TXO18000C",
                "TXO18000P",
                "TXO18100C",
                "TXO18100P"
            ]
        );
        assert!(selection.unresolved.is_empty());
    }

    #[tokio::test]
    async fn window_edge_outside_catalog_is_unresolved() {
        let (_session, manager) = setup(2).await;
        let selection = manager.select_targets(Decimal::from(19000));
        assert_eq!(selection.contracts.len(), 3);
        assert_eq!(selection.unresolved.len(), 2);
    }

    #[test]
    fn non_positive_strikes_stay_unresolved() {
        let catalog = catalog();
        let session = Arc::new(ScriptedSession::new(catalog.clone()));
        let manager = ContractManager::new(session, catalog, config(2, vec![OptionType::Call]));

        let selection = manager.select_targets(Decimal::from(100));
        assert_eq!(selection.strikes.len(), 5);
        assert_eq!(selection.strikes[0], Decimal::from(-100));
        assert!(selection.contracts.is_empty());
        assert_eq!(selection.unresolved.len(), 5);
    }

    #[test]
    fn resolve_delegates_to_catalog() {
        let mut catalog = MockContractCatalog::new();
        catalog
            .expect_lookup()
            .withf(|key| key.strike() == Decimal::from(18000))
            .returning(|_| None);
        let session = Arc::new(ScriptedSession::new(Arc::new(SessionCatalog::new("TXO"))));
        let manager = ContractManager::new(
            session,
            Arc::new(catalog),
            config(1, vec![OptionType::Put]),
        );
        assert!(manager.resolve(Decimal::from(18000), OptionType::Put).is_none());
    }

    #[tokio::test]
    async fn reconcile_subscribes_both_quote_kinds() {
        let (session, manager) = setup(1).await;
        let outcome = manager.reconcile(&calls(&[17900, 18000, 18100])).await;

        assert_eq!(
            outcome.subscribed_codes(),
            vec!["TXO17900C", "TXO18000C", "TXO18100C"]
        );
        assert!(outcome.failed.is_empty());
        for code in ["TXO17900C", "TXO18000C", "TXO18100C"] {
            assert!(session.is_active(code, QuoteKind::Tick));
            assert!(session.is_active(code, QuoteKind::BidAsk));
        }
        assert_eq!(manager.subscribed_count(), 3);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let (session, manager) = setup(1).await;
        let targets = calls(&[17900, 18000, 18100]);
        manager.reconcile(&targets).await;
        session.clear_calls();

        let outcome = manager.reconcile(&targets).await;
        assert!(outcome.is_noop());
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let (session, manager) = setup(1).await;
        session.fail("TXO18000C", ScriptedOp::Subscribe(QuoteKind::Tick));

        let outcome = manager.reconcile(&calls(&[17900, 18000, 18100])).await;
        assert_eq!(outcome.subscribed_codes(), vec!["TXO17900C", "TXO18100C"]);
        assert_eq!(outcome.failed_codes(), vec!["TXO18000C"]);
        assert_eq!(outcome.failed[0].operation, SubscriptionOperation::Subscribe);
        assert_eq!(
            manager.subscribed_codes(),
            vec!["TXO17900C".to_string(), "TXO18100C".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_contract_is_retried_next_pass() {
        let (session, manager) = setup(0).await;
        session.fail("TXO18000C", ScriptedOp::Subscribe(QuoteKind::Tick));
        let targets = calls(&[18000]);
        assert_eq!(manager.reconcile(&targets).await.failed.len(), 1);

        session.clear_failures();
        let outcome = manager.reconcile(&targets).await;
        assert_eq!(outcome.subscribed_codes(), vec!["TXO18000C"]);
    }

    #[tokio::test]
    async fn bid_ask_failure_rolls_back_tick() {
        let (session, manager) = setup(0).await;
        session.fail("TXO18000C", ScriptedOp::Subscribe(QuoteKind::BidAsk));

        let outcome = manager.reconcile(&calls(&[18000])).await;
        assert_eq!(outcome.failed_codes(), vec!["TXO18000C"]);
        assert!(!session.is_active("TXO18000C", QuoteKind::Tick));
        assert!(!session.is_active("TXO18000C", QuoteKind::BidAsk));
        assert_eq!(manager.subscribed_count(), 0);
        assert_eq!(
            session.calls(),
            vec![
                SessionCall::Subscribe("TXO18000C".to_string(), QuoteKind::Tick),
                SessionCall::Subscribe("TXO18000C".to_string(), QuoteKind::BidAsk),
                SessionCall::Unsubscribe("TXO18000C".to_string(), QuoteKind::Tick),
            ]
        );
    }

    #[tokio::test]
    async fn failed_unsubscribe_still_leaves_the_set() {
        let (session, manager) = setup(0).await;
        manager.reconcile(&calls(&[18000])).await;
        session.fail("TXO18000C", ScriptedOp::Unsubscribe(QuoteKind::Tick));

        let outcome = manager.reconcile(&calls(&[18100])).await;
        assert_eq!(outcome.failed_codes(), vec!["TXO18000C"]);
        assert_eq!(outcome.failed[0].operation, SubscriptionOperation::Unsubscribe);
        assert_eq!(outcome.subscribed_codes(), vec!["TXO18100C"]);
        assert_eq!(manager.subscribed_codes(), vec!["TXO18100C".to_string()]);
        // The other kind is still released.
        assert!(!session.is_active("TXO18000C", QuoteKind::BidAsk));
    }

    #[tokio::test]
    async fn unsubscribes_run_before_subscribes() {
        let (session, manager) = setup(0).await;
        manager.reconcile(&calls(&[18000])).await;
        session.clear_calls();

        manager.reconcile(&calls(&[18100])).await;
        let recorded = session.calls();
        assert!(matches!(recorded[0], SessionCall::Unsubscribe(ref code, _) if code == "TXO18000C"));
        assert!(matches!(recorded[2], SessionCall::Subscribe(ref code, _) if code == "TXO18100C"));
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let catalog = catalog();
        let session = Arc::new(ScriptedSession::new(catalog.clone()));
        session.connect().await.unwrap();
        session.set_delay(Duration::from_millis(500));
        let manager = ContractManager::new(
            session.clone(),
            catalog,
            ContractManagerConfig {
                call_timeout: Duration::from_millis(20),
                ..config(0, vec![OptionType::Call])
            },
        );

        let outcome = manager.reconcile(&calls(&[18000])).await;
        assert_eq!(outcome.failed_codes(), vec!["TXO18000C"]);
        assert_eq!(
            outcome.failed[0].reason,
            SessionError::Timeout {
                operation: "subscribe",
                timeout_ms: 20
            }
            .to_string()
        );
        assert_eq!(manager.subscribed_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_passes_are_serialized() {
        let (session, manager) = setup(1).await;
        session.set_delay(Duration::from_millis(5));
        let manager = Arc::new(manager);

        let a = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.reconcile(&calls(&[17900, 18000, 18100])).await })
        };
        let b = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.reconcile(&calls(&[18000, 18100, 18200])).await })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(session.max_in_flight(), 1);
        assert_eq!(manager.subscribed_count(), 3);
    }

    #[tokio::test]
    async fn refresh_freezes_on_invalid_price() {
        let (session, manager) = setup(1).await;
        manager.refresh(&priced(18000)).await;
        session.clear_calls();

        let state = PriceState::new();
        state.update(PriceSignal::Value(Decimal::from(18000)));
        state.update(PriceSignal::Value(Decimal::ZERO));

        assert_eq!(manager.refresh(&state.snapshot()).await, RefreshResult::Frozen);
        assert!(session.calls().is_empty());
        assert_eq!(manager.subscribed_count(), 3);
    }

    #[tokio::test]
    async fn refresh_keeps_subscriptions_when_catalog_has_no_targets() {
        let (session, manager) = setup(1).await;
        manager.refresh(&priced(18000)).await;
        session.clear_calls();

        let result = manager.refresh(&priced(25000)).await;
        assert_eq!(
            result,
            RefreshResult::NoTargets {
                atm: Decimal::from(25000)
            }
        );
        assert!(session.calls().is_empty());
        assert_eq!(manager.subscribed_count(), 3);
        assert_eq!(manager.last_atm(), Some(Decimal::from(18000)));
    }

    #[tokio::test]
    async fn extreme_price_resolves_nothing() {
        let (session, manager) = setup(1).await;
        let state = PriceState::new();
        state.update(PriceSignal::Value(Decimal::MAX));

        let result = manager.refresh(&state.snapshot()).await;
        assert!(matches!(result, RefreshResult::NoTargets { .. }));
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn refresh_shifts_window() {
        let (_session, manager) = setup(1).await;
        manager.refresh(&priced(18000)).await;

        let result = manager.refresh(&priced(18050)).await;
        let outcome = result.outcome().unwrap();
        assert_eq!(outcome.subscribed_codes(), vec!["TXO18200C"]);
        assert_eq!(outcome.unsubscribed_codes(), vec!["TXO17900C"]);
        assert_eq!(manager.last_atm(), Some(Decimal::from(18100)));
    }

    #[tokio::test]
    async fn unsubscribe_all_empties_set_despite_failures() {
        let (session, manager) = setup(1).await;
        manager.reconcile(&calls(&[17900, 18000, 18100])).await;
        session.fail("TXO18000C", ScriptedOp::Unsubscribe(QuoteKind::BidAsk));

        let outcome = manager.unsubscribe_all().await;
        assert_eq!(outcome.unsubscribed.len(), 2);
        assert_eq!(outcome.failed_codes(), vec!["TXO18000C"]);
        assert_eq!(manager.subscribed_count(), 0);
    }
}
