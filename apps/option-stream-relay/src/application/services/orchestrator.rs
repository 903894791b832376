//! Streaming Orchestrator
//!
//! Owns the relay lifecycle and every background task.
//!
//! # Lifecycle
//!
//! ```text
//! Created ─► Validating ─► Connecting ─► Running ─► Stopping ─► Stopped
//!                │              │
//!                └──────────────┴──────────────────────────────► Stopped
//! ```
//!
//! Missing configuration stops the relay at `Validating` with a fatal reason;
//! an upstream login failure stops it at `Connecting`. `Stopped` is terminal.
//!
//! # Tasks
//!
//! While running, four feed pumps drain the session's callback queues and
//! three timer loops drive the relay:
//!
//! | loop      | cadence              | work                                |
//! |-----------|----------------------|-------------------------------------|
//! | refresh   | `refresh_interval`   | re-centre the subscription window   |
//! | snapshot  | `snapshot_interval`  | poll snapshots for subscribed codes |
//! | heartbeat | `heartbeat_interval` | emit liveness while downstream is up|
//!
//! All of them stop on one [`CancellationToken`]. A loop iteration that has
//! started always runs to completion.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::contract_manager::{ContractManager, ContractManagerConfig, RefreshResult, with_timeout};
use super::market_data_handler::{HandlerStats, MarketDataHandler};
use crate::application::ports::{
    BroadcastError, BroadcastPort, FeedReceivers, SessionError, TradingSession, feed_channel,
};
use crate::domain::contract::{Contract, StrikeLadder, StrikeLadderError};
use crate::domain::price::{PriceSignal, PriceSnapshot, PriceState, PriceUpdate};
use crate::domain::streaming::{HeartbeatRecord, OutboundEvent, ReadyRecord};
use crate::infrastructure::config::{ConfigError, RelayConfig};
use crate::infrastructure::metrics;

// =============================================================================
// Lifecycle Types
// =============================================================================

/// Why the relay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Requested shutdown.
    Shutdown,
    /// Configuration was unusable.
    Fatal(String),
    /// The upstream session or downstream transport could not be started.
    StartupFailed(String),
}

impl StopReason {
    /// Detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Shutdown => None,
            Self::Fatal(detail) | Self::StartupFailed(detail) => Some(detail),
        }
    }
}

/// Relay lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, not started.
    Created,
    /// Checking configuration.
    Validating,
    /// Logging in upstream and connecting downstream.
    Connecting,
    /// Loops running.
    Running,
    /// Shutting down.
    Stopping,
    /// Terminal.
    Stopped(StopReason),
}

impl LifecycleState {
    /// Label for logs and status output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Validating => "validating",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped(_) => "stopped",
        }
    }

    /// Check if the relay is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Relay startup error.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Strike settings are unusable.
    #[error("strike settings: {0}")]
    Ladder(#[from] StrikeLadderError),

    /// Upstream session could not be started.
    #[error("upstream session: {0}")]
    Session(#[from] SessionError),

    /// Downstream transport could not be started.
    #[error("downstream broadcast: {0}")]
    Broadcast(#[from] BroadcastError),
}

/// Point-in-time view of the relay.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    /// Lifecycle state label.
    pub state: &'static str,
    /// Stop detail, once stopped abnormally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Upstream session connected.
    pub upstream_connected: bool,
    /// Downstream transport connected.
    pub downstream_connected: bool,
    /// Upstream session is simulated.
    pub simulation: bool,
    /// Underlying price state.
    pub price: PriceSnapshot,
    /// At-the-money strike of the last refresh.
    pub atm: Option<Decimal>,
    /// Subscribed contract codes.
    pub subscribed: Vec<String>,
    /// Relay event counters.
    pub events: HandlerStats,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Top-level relay coordinator.
pub struct StreamingOrchestrator {
    config: RelayConfig,
    session: Arc<dyn TradingSession>,
    broadcast: Arc<dyn BroadcastPort>,
    handler: Arc<MarketDataHandler>,
    price: PriceState,
    state: RwLock<LifecycleState>,
    manager: RwLock<Option<Arc<ContractManager>>>,
    ready_sent: AtomicBool,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl StreamingOrchestrator {
    /// Create an orchestrator in the `Created` state.
    #[must_use]
    pub fn new(
        config: RelayConfig,
        session: Arc<dyn TradingSession>,
        broadcast: Arc<dyn BroadcastPort>,
    ) -> Self {
        let handler = Arc::new(MarketDataHandler::new(Arc::clone(&broadcast)));
        Self {
            config,
            session,
            broadcast,
            handler,
            price: PriceState::new(),
            state: RwLock::new(LifecycleState::Created),
            manager: RwLock::new(None),
            ready_sent: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validate, connect both sides and start every task.
    ///
    /// Calling `start` on a relay that is already running or stopped does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if configuration is incomplete or either side
    /// fails to start. The relay is then `Stopped`.
    pub async fn start(self: &Arc<Self>) -> Result<(), RelayError> {
        let _lifecycle = self.lifecycle.lock().await;
        if *self.state.read() != LifecycleState::Created {
            debug!(state = self.state().as_str(), "Start ignored");
            return Ok(());
        }

        self.set_state(LifecycleState::Validating);
        let ladder = match self.validate() {
            Ok(ladder) => ladder,
            Err(e) => {
                error!(error = %e, "Relay configuration invalid");
                self.set_state(LifecycleState::Stopped(StopReason::Fatal(e.to_string())));
                return Err(e);
            }
        };

        self.set_state(LifecycleState::Connecting);
        let (feed, receivers) = feed_channel(self.config.loops.feed_capacity);
        self.session.register_feed(feed);

        let manager = match self.connect(ladder).await {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                error!(error = %e, "Relay failed to start");
                self.session.disconnect().await;
                self.set_state(LifecycleState::Stopped(StopReason::StartupFailed(
                    e.to_string(),
                )));
                return Err(e);
            }
        };
        *self.manager.write() = Some(manager);

        self.spawn_pumps(receivers);
        self.spawn_loops();
        self.set_state(LifecycleState::Running);

        info!(
            simulation = self.session.is_simulation(),
            underlying = %self.config.strikes.underlying_code,
            interval = %self.config.strikes.interval,
            range = self.config.strikes.atm_range,
            "Relay running"
        );
        self.announce_ready();
        Ok(())
    }

    /// Stop every task, release subscriptions and disconnect both sides.
    ///
    /// Idempotent. Tasks that outlive the shutdown timeout are detached.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        match self.state() {
            LifecycleState::Stopped(_) => return,
            LifecycleState::Created => {
                self.set_state(LifecycleState::Stopped(StopReason::Shutdown));
                return;
            }
            _ => {}
        }

        self.set_state(LifecycleState::Stopping);
        info!("Stopping relay");
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock());
        let pending = handles.len();
        let timeout = self.config.loops.shutdown_timeout;
        if tokio::time::timeout(timeout, join_all(handles)).await.is_err() {
            warn!(
                tasks = pending,
                timeout_ms = timeout.as_millis(),
                "Background tasks did not finish in time, detaching"
            );
        }

        if let Some(manager) = self.manager() {
            manager.unsubscribe_all().await;
        }
        self.session.disconnect().await;
        self.broadcast.disconnect().await;

        self.set_state(LifecycleState::Stopped(StopReason::Shutdown));
        info!("Relay stopped");
    }

    fn validate(&self) -> Result<StrikeLadder, RelayError> {
        self.config.validate()?;
        Ok(StrikeLadder::new(
            self.config.strikes.interval,
            self.config.strikes.atm_range,
        )?)
    }

    async fn connect(&self, ladder: StrikeLadder) -> Result<ContractManager, RelayError> {
        self.session.connect().await?;
        let catalog = self.session.catalog()?;
        info!(
            contracts = catalog.len(),
            simulation = self.session.is_simulation(),
            "Upstream session connected"
        );
        if catalog.is_empty() {
            warn!("Contract catalog is empty, no option will be subscribed");
        }

        self.broadcast.connect().await?;

        Ok(ContractManager::new(
            Arc::clone(&self.session),
            catalog,
            ContractManagerConfig {
                ladder,
                option_types: self.config.strikes.option_types.clone(),
                call_timeout: self.config.loops.call_timeout,
            },
        ))
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Apply an underlying price signal.
    pub fn update_price(&self, signal: PriceSignal) -> PriceUpdate {
        let update = self.price.update(signal);
        match (update, signal) {
            (PriceUpdate::Accepted, PriceSignal::Value(value)) => {
                if let Some(value) = value.to_f64() {
                    metrics::set_underlying_price(value);
                }
                trace!(price = %value, "Underlying price updated");
            }
            (PriceUpdate::Rejected, PriceSignal::Value(value)) => {
                debug!(price = %value, "Non-positive underlying price, marked stale");
            }
            (PriceUpdate::Cleared, _) => debug!("Underlying price unavailable"),
            _ => {}
        }
        update
    }

    /// Run one subscription refresh. `None` before the relay has connected.
    ///
    /// Every per-contract failure is also reported downstream as a fault.
    pub async fn refresh_subscriptions(&self) -> Option<RefreshResult> {
        let manager = self.manager()?;
        let result = manager.refresh(&self.price.snapshot()).await;
        if let Some(outcome) = result.outcome() {
            for failure in &outcome.failed {
                self.handler
                    .on_fault(&failure.reason, Some(failure.contract.code()));
            }
        }
        Some(result)
    }

    /// Request a snapshot for every subscribed contract. Returns the number
    /// of snapshot records emitted.
    pub async fn poll_snapshots(&self) -> usize {
        let Some(manager) = self.manager() else {
            return 0;
        };
        let contracts = manager.subscribed_contracts();
        if contracts.is_empty() {
            return 0;
        }

        let timeout = self.config.loops.call_timeout;
        let session = &self.session;
        let results = join_all(contracts.iter().map(|contract| async move {
            let result = with_timeout("snapshot", timeout, session.snapshot(contract)).await;
            (contract, result)
        }))
        .await;

        let mut emitted = 0;
        for (contract, result) in results {
            match result {
                Ok(payload) => emitted += self.handler.on_snapshot(payload),
                Err(e) => self.snapshot_failed(contract, &e),
            }
        }
        trace!(contracts = contracts.len(), emitted, "Snapshot poll done");
        emitted
    }

    /// Emit one heartbeat. Skipped while downstream is disconnected.
    pub fn send_heartbeat(&self) -> bool {
        if !self.broadcast.is_connected() {
            trace!("Downstream not connected, heartbeat skipped");
            return false;
        }
        if !self.ready_sent.load(Ordering::Acquire) {
            self.announce_ready();
        }
        self.handler
            .publish(OutboundEvent::Heartbeat(self.heartbeat_record()))
    }

    /// Heartbeat payload for the current state.
    #[must_use]
    pub fn heartbeat_record(&self) -> HeartbeatRecord {
        let price = self.price.snapshot();
        HeartbeatRecord {
            status: "running",
            upstream_connected: self.session.is_connected(),
            downstream_connected: self.broadcast.is_connected(),
            current_price: price.value,
            price_stale: !price.valid,
            subscribed_count: self.subscribed_count(),
            timestamp: Utc::now(),
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.read().clone()
    }

    /// Current underlying price state.
    #[must_use]
    pub fn price(&self) -> PriceSnapshot {
        self.price.snapshot()
    }

    /// Subscribed contracts, in code order.
    #[must_use]
    pub fn subscribed_contracts(&self) -> Vec<Contract> {
        self.manager()
            .map(|m| m.subscribed_contracts())
            .unwrap_or_default()
    }

    /// Number of subscribed contracts.
    #[must_use]
    pub fn subscribed_count(&self) -> usize {
        self.manager().map_or(0, |m| m.subscribed_count())
    }

    /// Event counters.
    #[must_use]
    pub fn handler(&self) -> &MarketDataHandler {
        &self.handler
    }

    /// Full status view.
    #[must_use]
    pub fn status(&self) -> RelayStatus {
        let state = self.state();
        let manager = self.manager();
        RelayStatus {
            state: state.as_str(),
            stop_reason: match &state {
                LifecycleState::Stopped(reason) => reason.detail().map(ToOwned::to_owned),
                _ => None,
            },
            upstream_connected: self.session.is_connected(),
            downstream_connected: self.broadcast.is_connected(),
            simulation: self.session.is_simulation(),
            price: self.price.snapshot(),
            atm: manager.as_ref().and_then(|m| m.last_atm()),
            subscribed: manager.map(|m| m.subscribed_codes()).unwrap_or_default(),
            events: self.handler.stats(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn manager(&self) -> Option<Arc<ContractManager>> {
        self.manager.read().clone()
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write();
        debug!(from = state.as_str(), to = next.as_str(), "Lifecycle transition");
        *state = next;
    }

    fn announce_ready(&self) {
        let delivered = self.handler.publish(OutboundEvent::Ready(ReadyRecord {
            status: "ready",
            simulation: self.session.is_simulation(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service_type: "market_data",
            timestamp: Utc::now(),
        }));
        if delivered {
            self.ready_sent.store(true, Ordering::Release);
        }
    }

    fn snapshot_failed(&self, contract: &Contract, error: &SessionError) {
        metrics::record_snapshot_failure();
        warn!(code = contract.code(), error = %error, "Snapshot request failed");
        self.handler.on_fault(&error.to_string(), Some(contract.code()));
    }

    fn spawn_pumps(self: &Arc<Self>, receivers: FeedReceivers) {
        let FeedReceivers {
            ticks,
            bid_asks,
            snapshots,
            prices,
        } = receivers;

        let this = Arc::clone(self);
        let tick_pump = spawn_pump("ticks", ticks, self.cancel.clone(), move |raw| {
            if raw.text("code").as_deref() == Some(this.config.strikes.underlying_code.as_str()) {
                if let Some(close) = raw.decimal("close") {
                    this.update_price(PriceSignal::Value(close));
                }
            }
            this.handler.on_tick(&raw);
        });

        let handler = Arc::clone(&self.handler);
        let bid_ask_pump = spawn_pump("bid_asks", bid_asks, self.cancel.clone(), move |raw| {
            handler.on_bid_ask(&raw);
        });

        let handler = Arc::clone(&self.handler);
        let snapshot_pump = spawn_pump("snapshots", snapshots, self.cancel.clone(), move |payload| {
            handler.on_snapshot(payload);
        });

        let this = Arc::clone(self);
        let price_pump = spawn_pump("prices", prices, self.cancel.clone(), move |signal| {
            this.update_price(signal);
        });

        self.tasks
            .lock()
            .extend([tick_pump, bid_ask_pump, snapshot_pump, price_pump]);
    }

    fn spawn_loops(self: &Arc<Self>) {
        let loops = &self.config.loops;
        let refresh = self.spawn_loop("refresh", loops.refresh_interval, |this| async move {
            this.refresh_subscriptions().await;
        });
        let snapshot = self.spawn_loop("snapshot", loops.snapshot_interval, |this| async move {
            this.poll_snapshots().await;
        });
        let heartbeat = self.spawn_loop("heartbeat", loops.heartbeat_interval, |this| async move {
            this.send_heartbeat();
        });
        self.tasks.lock().extend([refresh, snapshot, heartbeat]);
    }

    fn spawn_loop<F, Fut>(
        self: &Arc<Self>,
        name: &'static str,
        period: Duration,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                // A panicking cycle is logged; the next tick runs again.
                if let Err(panic) = AssertUnwindSafe(work(Arc::clone(&this)))
                    .catch_unwind()
                    .await
                {
                    error!(task = name, panic = panic_message(&*panic), "Loop cycle panicked");
                }
            }
            debug!(task = name, "Loop stopped");
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn spawn_pump<T, F>(
    name: &'static str,
    mut rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    mut handle: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => handle(item),
                    None => break,
                },
            }
        }
        debug!(task = name, "Feed pump stopped");
    })
}

// =============================================================================
// Tests
// =============================================================================
