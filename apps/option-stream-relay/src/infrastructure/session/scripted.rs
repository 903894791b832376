//! Scripted trading session for tests and development.
//!
//! Deterministic [`TradingSession`] with per-contract failure injection,
//! configurable call latency, call recording and manual event injection.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::json;

use crate::application::ports::{
    ContractCatalog, FeedSender, QuoteKind, SessionError, SnapshotPayload, TradingSession,
};
use crate::domain::contract::Contract;
use crate::domain::price::PriceSignal;
use crate::domain::streaming::RawEvent;

/// A recorded session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    /// `subscribe(code, kind)`.
    Subscribe(String, QuoteKind),
    /// `unsubscribe(code, kind)`.
    Unsubscribe(String, QuoteKind),
    /// `snapshot(code)`.
    Snapshot(String),
}

/// Operation targeted by an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptedOp {
    /// Subscribe of one quote kind.
    Subscribe(QuoteKind),
    /// Unsubscribe of one quote kind.
    Unsubscribe(QuoteKind),
    /// Snapshot request.
    Snapshot,
}

/// Scripted session.
pub struct ScriptedSession {
    catalog: Arc<dyn ContractCatalog>,
    simulation: bool,
    connected: AtomicBool,
    connect_error: RwLock<Option<SessionError>>,
    feed: RwLock<Option<FeedSender>>,
    failures: RwLock<HashMap<(String, ScriptedOp), SessionError>>,
    delay: RwLock<Duration>,
    snapshots: RwLock<HashMap<String, SnapshotPayload>>,
    active: Mutex<BTreeSet<(String, &'static str)>>,
    calls: Mutex<Vec<SessionCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSession {
    /// Create a session over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn ContractCatalog>) -> Self {
        Self {
            catalog,
            simulation: true,
            connected: AtomicBool::new(false),
            connect_error: RwLock::new(None),
            feed: RwLock::new(None),
            failures: RwLock::new(HashMap::new()),
            delay: RwLock::new(Duration::ZERO),
            snapshots: RwLock::new(HashMap::new()),
            active: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Make `connect` fail with `error`.
    pub fn fail_connect(&self, error: SessionError) {
        *self.connect_error.write() = Some(error);
    }

    /// Make one operation fail for one contract code.
    pub fn fail(&self, code: &str, op: ScriptedOp) {
        let error = match op {
            ScriptedOp::Subscribe(_) => SessionError::Rejected {
                operation: "subscribe",
                code: code.to_string(),
                reason: "scripted failure".to_string(),
            },
            ScriptedOp::Unsubscribe(_) => SessionError::Rejected {
                operation: "unsubscribe",
                code: code.to_string(),
                reason: "scripted failure".to_string(),
            },
            ScriptedOp::Snapshot => SessionError::ContractNotFound(code.to_string()),
        };
        self.failures.write().insert((code.to_string(), op), error);
    }

    /// Remove every injected per-contract failure.
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Delay every subscribe/unsubscribe/snapshot call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = delay;
    }

    /// Script the snapshot response for a code.
    pub fn set_snapshot(&self, code: &str, payload: SnapshotPayload) {
        self.snapshots.write().insert(code.to_string(), payload);
    }

    /// Simulate an upstream drop or recovery without a new login.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    // =========================================================================
    // Event Injection
    // =========================================================================

    /// Push a tick through the registered feed.
    pub fn push_tick(&self, raw: RawEvent) -> bool {
        self.feed.read().as_ref().is_some_and(|f| f.send_tick(raw))
    }

    /// Push a bid/ask update through the registered feed.
    pub fn push_bid_ask(&self, raw: RawEvent) -> bool {
        self.feed.read().as_ref().is_some_and(|f| f.send_bid_ask(raw))
    }

    /// Push a snapshot through the registered feed.
    pub fn push_snapshot(&self, payload: SnapshotPayload) -> bool {
        self.feed
            .read()
            .as_ref()
            .is_some_and(|f| f.send_snapshot(payload))
    }

    /// Push an underlying price through the registered feed.
    pub fn push_price(&self, signal: PriceSignal) -> bool {
        self.feed.read().as_ref().is_some_and(|f| f.send_price(signal))
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Codes with at least one active quote subscription.
    #[must_use]
    pub fn active_codes(&self) -> Vec<String> {
        let active = self.active.lock();
        let mut codes: Vec<String> = active.iter().map(|(code, _)| code.clone()).collect();
        codes.dedup();
        codes
    }

    /// Whether a specific quote kind is active for a code.
    #[must_use]
    pub fn is_active(&self, code: &str, kind: QuoteKind) -> bool {
        self.active.lock().contains(&(code.to_string(), kind.as_str()))
    }

    /// Highest number of concurrent subscribe/unsubscribe calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Whether a feed has been registered.
    #[must_use]
    pub fn has_feed(&self) -> bool {
        self.feed.read().is_some()
    }

    async fn run_call(&self, call: SessionCall, op: ScriptedOp) -> Result<(), SessionError> {
        let code = match &call {
            SessionCall::Subscribe(code, _)
            | SessionCall::Unsubscribe(code, _)
            | SessionCall::Snapshot(code) => code.clone(),
        };
        self.calls.lock().push(call);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::NotConnected);
        }
        if let Some(error) = self.failures.read().get(&(code, op)) {
            return Err(error.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl TradingSession for ScriptedSession {
    async fn connect(&self) -> Result<(), SessionError> {
        if let Some(error) = self.connect_error.read().clone() {
            return Err(error);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.active.lock().clear();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_simulation(&self) -> bool {
        self.simulation
    }

    fn catalog(&self) -> Result<Arc<dyn ContractCatalog>, SessionError> {
        Ok(Arc::clone(&self.catalog))
    }

    fn register_feed(&self, feed: FeedSender) {
        *self.feed.write() = Some(feed);
    }

    async fn subscribe(&self, contract: &Contract, kind: QuoteKind) -> Result<(), SessionError> {
        let call = SessionCall::Subscribe(contract.code().to_string(), kind);
        self.run_call(call, ScriptedOp::Subscribe(kind)).await?;
        self.active
            .lock()
            .insert((contract.code().to_string(), kind.as_str()));
        Ok(())
    }

    async fn unsubscribe(&self, contract: &Contract, kind: QuoteKind) -> Result<(), SessionError> {
        let call = SessionCall::Unsubscribe(contract.code().to_string(), kind);
        self.run_call(call, ScriptedOp::Unsubscribe(kind)).await?;
        self.active
            .lock()
            .remove(&(contract.code().to_string(), kind.as_str()));
        Ok(())
    }

    async fn snapshot(&self, contract: &Contract) -> Result<SnapshotPayload, SessionError> {
        let call = SessionCall::Snapshot(contract.code().to_string());
        self.run_call(call, ScriptedOp::Snapshot).await?;
        let scripted = self.snapshots.read().get(contract.code()).cloned();
        Ok(scripted.unwrap_or_else(|| {
            SnapshotPayload::Single(RawEvent::new(json!({ "code": contract.code() })))
        }))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::feed_channel;
    use crate::domain::contract::OptionType;
    use crate::infrastructure::catalog::SessionCatalog;

    fn session() -> ScriptedSession {
        ScriptedSession::new(Arc::new(SessionCatalog::new("TXO")))
    }

    fn contract() -> Contract {
        Contract::new("TXO18000C", Decimal::from(18000), OptionType::Call)
    }

    #[tokio::test]
    async fn calls_require_connection() {
        let session = session();
        let err = session.subscribe(&contract(), QuoteKind::Tick).await;
        assert_eq!(err, Err(SessionError::NotConnected));

        session.connect().await.unwrap();
        session.subscribe(&contract(), QuoteKind::Tick).await.unwrap();
        assert!(session.is_active("TXO18000C", QuoteKind::Tick));
        assert!(!session.is_active("TXO18000C", QuoteKind::BidAsk));
    }

    #[tokio::test]
    async fn injected_failures_apply_per_operation() {
        let session = session();
        session.connect().await.unwrap();
        session.fail("TXO18000C", ScriptedOp::Subscribe(QuoteKind::BidAsk));

        assert!(session.subscribe(&contract(), QuoteKind::Tick).await.is_ok());
        assert!(session.subscribe(&contract(), QuoteKind::BidAsk).await.is_err());

        session.clear_failures();
        assert!(session.subscribe(&contract(), QuoteKind::BidAsk).await.is_ok());
        assert_eq!(session.calls().len(), 3);
    }

    #[tokio::test]
    async fn connect_failure_is_scripted() {
        let session = session();
        session.fail_connect(SessionError::LoginFailed("bad key".to_string()));
        assert!(session.connect().await.is_err());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn injection_requires_registered_feed() {
        let session = session();
        assert!(!session.push_price(PriceSignal::Unavailable));

        let (sender, mut receivers) = feed_channel(8);
        session.register_feed(sender);
        assert!(session.has_feed());
        assert!(session.push_price(PriceSignal::Value(Decimal::from(18000))));
        assert_eq!(
            receivers.prices.recv().await,
            Some(PriceSignal::Value(Decimal::from(18000)))
        );
    }

    #[tokio::test]
    async fn default_snapshot_carries_code() {
        let session = session();
        session.connect().await.unwrap();
        let payload = session.snapshot(&contract()).await.unwrap();
        let entries = payload.into_entries();
        assert_eq!(entries[0].text("code").as_deref(), Some("TXO18000C"));
    }
}
