//! Simulated trading session.
//!
//! Runs a random-walk underlying and synthesizes option ticks, order book
//! updates and snapshots for subscribed contracts. Used when the relay runs
//! against a simulated market.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::{Map, json};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ContractCatalog, FeedSender, QuoteKind, SessionError, SnapshotPayload, TradingSession,
};
use crate::domain::contract::{Contract, ContractKey, OptionType};
use crate::domain::price::PriceSignal;
use crate::domain::streaming::RawEvent;
use crate::infrastructure::catalog::{CatalogEntry, SessionCatalog};
use crate::infrastructure::config::Credentials;

const EXCHANGE: &str = "TAIFEX";
const BOOK_DEPTH: usize = 5;

/// Simulated market parameters.
#[derive(Debug, Clone)]
pub struct SimulatedSessionConfig {
    /// Contract code root.
    pub contract_root: String,
    /// Code of the underlying instrument.
    pub underlying_code: String,
    /// Starting underlying price.
    pub base_price: Decimal,
    /// Strike spacing of the generated catalog.
    pub strike_interval: Decimal,
    /// Strikes listed on each side of the starting price.
    pub listed_strikes: u32,
    /// Delivery month of the generated contracts.
    pub delivery_month: String,
    /// Market event cadence.
    pub tick_interval: Duration,
}

impl Default for SimulatedSessionConfig {
    fn default() -> Self {
        Self {
            contract_root: "TXO".to_string(),
            underlying_code: "TXFR1".to_string(),
            base_price: Decimal::from(18_000),
            strike_interval: Decimal::from(100),
            listed_strikes: 40,
            delivery_month: Utc::now().format("%Y%m").to_string(),
            tick_interval: Duration::from_millis(500),
        }
    }
}

/// Per-contract session statistics used to build ticks and snapshots.
#[derive(Debug, Clone, Copy)]
struct Quote {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    total_volume: i64,
}

impl Quote {
    const fn new(price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            total_volume: 0,
        }
    }

    fn trade(&mut self, price: f64, volume: i64) {
        self.close = price;
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.total_volume += volume;
    }
}

struct Market {
    underlying: f64,
    quotes: HashMap<String, Quote>,
}

/// Simulated [`TradingSession`].
pub struct SimulatedSession {
    config: SimulatedSessionConfig,
    credentials: Credentials,
    catalog: RwLock<Option<Arc<SessionCatalog>>>,
    feed: Arc<RwLock<Option<FeedSender>>>,
    market: Arc<Mutex<Market>>,
    active: Arc<Mutex<BTreeSet<(String, &'static str)>>>,
    connected: AtomicBool,
    generator: Mutex<Option<CancellationToken>>,
}

impl SimulatedSession {
    /// Create a disconnected session.
    #[must_use]
    pub fn new(config: SimulatedSessionConfig, credentials: Credentials) -> Self {
        let underlying = config.base_price.to_f64().unwrap_or_default();
        Self {
            config,
            credentials,
            catalog: RwLock::new(None),
            feed: Arc::new(RwLock::new(None)),
            market: Arc::new(Mutex::new(Market {
                underlying,
                quotes: HashMap::new(),
            })),
            active: Arc::new(Mutex::new(BTreeSet::new())),
            connected: AtomicBool::new(false),
            generator: Mutex::new(None),
        }
    }

    fn build_catalog(&self) -> SessionCatalog {
        let interval = self.config.strike_interval;
        let centre = (self.config.base_price / interval).round() * interval;
        let listed = i64::from(self.config.listed_strikes);

        let entries = (-listed..=listed)
            .map(|offset| centre + interval * Decimal::from(offset))
            .filter(|strike| *strike > Decimal::ZERO)
            .flat_map(|strike| [OptionType::Call, OptionType::Put].map(|t| (strike, t)))
            .map(|(strike, option_type)| {
                let key = ContractKey::new(strike, option_type);
                let mut record = Map::new();
                record.insert("code".into(), json!(key.code(&self.config.contract_root)));
                record.insert("strike_price".into(), json!(key.strike().to_string()));
                record.insert("option_right".into(), json!(option_type.as_str()));
                record.insert("delivery_month".into(), json!(self.config.delivery_month));
                record.insert("underlying_code".into(), json!(self.config.underlying_code));
                CatalogEntry::Record(record)
            });

        SessionCatalog::from_entries(self.config.contract_root.clone(), entries)
    }

    fn find_listed(&self, contract: &Contract) -> Result<(), SessionError> {
        let catalog = self.catalog.read();
        let listed = catalog
            .as_ref()
            .and_then(|c| c.lookup(&contract.key()))
            .is_some_and(|c| c.code() == contract.code());
        if listed {
            Ok(())
        } else {
            Err(SessionError::ContractNotFound(contract.code().to_string()))
        }
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn spawn_generator(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let generator = Generator {
            config: self.config.clone(),
            feed: Arc::clone(&self.feed),
            market: Arc::clone(&self.market),
            active: Arc::clone(&self.active),
            catalog: self.catalog.read().clone(),
        };
        let token = cancel.clone();
        tokio::spawn(async move { generator.run(token).await });
        cancel
    }
}

#[async_trait]
impl TradingSession for SimulatedSession {
    async fn connect(&self) -> Result<(), SessionError> {
        if self.credentials.api_key().is_empty() || self.credentials.secret_key().is_empty() {
            return Err(SessionError::LoginFailed(
                "api key and secret key are required".to_string(),
            ));
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let catalog = Arc::new(self.build_catalog());
        tracing::info!(
            contracts = catalog.len(),
            underlying = %self.config.underlying_code,
            "Simulated session logged in"
        );
        *self.catalog.write() = Some(catalog);
        *self.generator.lock() = Some(self.spawn_generator());
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(cancel) = self.generator.lock().take() {
            cancel.cancel();
        }
        self.active.lock().clear();
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!("Simulated session logged out");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_simulation(&self) -> bool {
        true
    }

    fn catalog(&self) -> Result<Arc<dyn ContractCatalog>, SessionError> {
        let catalog = self.catalog.read().clone();
        catalog
            .map(|c| c as Arc<dyn ContractCatalog>)
            .ok_or(SessionError::CatalogUnavailable)
    }

    fn register_feed(&self, feed: FeedSender) {
        *self.feed.write() = Some(feed);
    }

    async fn subscribe(&self, contract: &Contract, kind: QuoteKind) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.find_listed(contract)?;
        self.active
            .lock()
            .insert((contract.code().to_string(), kind.as_str()));
        Ok(())
    }

    async fn unsubscribe(&self, contract: &Contract, kind: QuoteKind) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.active
            .lock()
            .remove(&(contract.code().to_string(), kind.as_str()));
        Ok(())
    }

    async fn snapshot(&self, contract: &Contract) -> Result<SnapshotPayload, SessionError> {
        self.ensure_connected()?;
        self.find_listed(contract)?;

        let mut market = self.market.lock();
        let underlying = market.underlying;
        let interval = self.config.strike_interval.to_f64().unwrap_or(100.0);
        let quote = *market
            .quotes
            .entry(contract.code().to_string())
            .or_insert_with(|| Quote::new(fair_value(contract, underlying, interval)));
        drop(market);

        Ok(SnapshotPayload::Single(RawEvent::new(json!({
            "code": contract.code(),
            "name": format!("{} {}", contract.code(), contract.option_type()),
            "ts": Utc::now().timestamp_nanos_opt(),
            "open": quote.open,
            "high": quote.high,
            "low": quote.low,
            "close": quote.close,
            "volume": 0,
            "total_volume": quote.total_volume,
            "amount": quote.close * quote.total_volume as f64,
            "buy_price": round_tick(quote.close - 0.5),
            "sell_price": round_tick(quote.close + 0.5),
        }))))
    }
}

// =============================================================================
// Market Generator
// =============================================================================

struct Generator {
    config: SimulatedSessionConfig,
    feed: Arc<RwLock<Option<FeedSender>>>,
    market: Arc<Mutex<Market>>,
    active: Arc<Mutex<BTreeSet<(String, &'static str)>>>,
    catalog: Option<Arc<SessionCatalog>>,
}

impl Generator {
    async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => self.step(),
            }
        }
        tracing::debug!("Simulated market generator stopped");
    }

    fn step(&self) {
        let Some(feed) = self.feed.read().clone() else {
            return;
        };
        let interval = self.config.strike_interval.to_f64().unwrap_or(100.0);
        let active: Vec<(String, &'static str)> = self.active.lock().iter().cloned().collect();
        let datetime = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();

        let mut rng = rand::rng();
        let mut market = self.market.lock();
        let step = rng.random_range(-0.15..=0.15) * interval;
        market.underlying = (market.underlying + step).max(interval);
        let underlying = round_tick(market.underlying);

        feed.send_price(PriceSignal::from(Decimal::from_f64(underlying)));
        feed.send_tick(RawEvent::new(json!({
            "exchange": EXCHANGE,
            "code": self.config.underlying_code,
            "datetime": datetime,
            "close": underlying,
            "volume": rng.random_range(1..20),
        })));

        for (code, kind) in active {
            let Some(contract) = self.lookup(&code) else {
                continue;
            };
            let fair = fair_value(&contract, underlying, interval);
            let quote = market
                .quotes
                .entry(code.clone())
                .or_insert_with(|| Quote::new(fair));

            if kind == QuoteKind::Tick.as_str() {
                let volume = rng.random_range(1..10);
                let price = round_tick((fair + rng.random_range(-0.5..=0.5)).max(0.1));
                quote.trade(price, volume);
                feed.send_tick(RawEvent::new(json!({
                    "exchange": EXCHANGE,
                    "code": code,
                    "datetime": datetime,
                    "open": quote.open,
                    "high": quote.high,
                    "low": quote.low,
                    "close": quote.close,
                    "volume": volume,
                    "total_volume": quote.total_volume,
                })));
            } else {
                let (bids, asks) = book_levels(quote.close);
                let bid_volume: Vec<i64> = (0..BOOK_DEPTH).map(|_| rng.random_range(1..50)).collect();
                let ask_volume: Vec<i64> = (0..BOOK_DEPTH).map(|_| rng.random_range(1..50)).collect();
                feed.send_bid_ask(RawEvent::new(json!({
                    "exchange": EXCHANGE,
                    "code": code,
                    "datetime": datetime,
                    "bid_price": bids,
                    "bid_volume": bid_volume,
                    "ask_price": asks,
                    "ask_volume": ask_volume,
                })));
            }
        }
    }

    fn lookup(&self, code: &str) -> Option<Contract> {
        let key = ContractKey::parse_code(&self.config.contract_root, code)?;
        self.catalog.as_ref()?.lookup(&key)
    }
}

/// Intrinsic value plus a time value that decays away from the money.
fn fair_value(contract: &Contract, underlying: f64, interval: f64) -> f64 {
    let strike = contract.strike().to_f64().unwrap_or_default();
    let intrinsic = match contract.option_type() {
        OptionType::Call => (underlying - strike).max(0.0),
        OptionType::Put => (strike - underlying).max(0.0),
    };
    let distance = (underlying - strike).abs() / interval;
    let time_value = interval * 1.5 * (-distance / 3.0).exp();
    round_tick((intrinsic + time_value).max(0.1))
}

fn book_levels(close: f64) -> (Vec<f64>, Vec<f64>) {
    #[allow(clippy::cast_precision_loss)]
    let level = |i: usize| i as f64 * 0.5;
    let bids = (0..BOOK_DEPTH)
        .map(|i| round_tick((close - 0.5 - level(i)).max(0.0)))
        .collect();
    let asks = (0..BOOK_DEPTH)
        .map(|i| round_tick(close + 0.5 + level(i)))
        .collect();
    (bids, asks)
}

fn round_tick(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::feed_channel;

    fn credentials() -> Credentials {
        Credentials::new("key".to_string(), "secret".to_string(), None, None)
    }

    fn config() -> SimulatedSessionConfig {
        SimulatedSessionConfig {
            listed_strikes: 3,
            tick_interval: Duration::from_millis(10),
            ..SimulatedSessionConfig::default()
        }
    }

    #[tokio::test]
    async fn login_requires_credentials() {
        let session = SimulatedSession::new(
            config(),
            Credentials::new(String::new(), "secret".to_string(), None, None),
        );
        assert!(matches!(
            session.connect().await,
            Err(SessionError::LoginFailed(_))
        ));
        assert!(session.catalog().is_err());
    }

    #[tokio::test]
    async fn catalog_lists_both_rights() {
        let session = SimulatedSession::new(config(), credentials());
        session.connect().await.unwrap();

        let catalog = session.catalog().unwrap();
        assert_eq!(catalog.len(), 14);
        let key = ContractKey::new(Decimal::from(18_000), OptionType::Put);
        assert_eq!(catalog.lookup(&key).unwrap().code(), "TXO18000P");

        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn unlisted_contract_is_not_found() {
        let session = SimulatedSession::new(config(), credentials());
        session.connect().await.unwrap();
        let unlisted = Contract::new("TXO99000C", Decimal::from(99_000), OptionType::Call);
        assert!(matches!(
            session.subscribe(&unlisted, QuoteKind::Tick).await,
            Err(SessionError::ContractNotFound(_))
        ));
        session.disconnect().await;
    }

    #[tokio::test]
    async fn generator_streams_price_and_subscribed_quotes() {
        let session = SimulatedSession::new(config(), credentials());
        let (sender, mut receivers) = feed_channel(256);
        session.register_feed(sender);
        session.connect().await.unwrap();

        let contract = session
            .catalog()
            .unwrap()
            .lookup(&ContractKey::new(Decimal::from(18_000), OptionType::Call))
            .unwrap();
        session.subscribe(&contract, QuoteKind::Tick).await.unwrap();
        session.subscribe(&contract, QuoteKind::BidAsk).await.unwrap();

        let price = tokio::time::timeout(Duration::from_secs(2), receivers.prices.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(price, PriceSignal::Value(p) if p > Decimal::ZERO));

        let bid_ask = tokio::time::timeout(Duration::from_secs(2), receivers.bid_asks.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bid_ask.text("code").as_deref(), Some("TXO18000C"));

        let snapshot = session.snapshot(&contract).await.unwrap().into_entries();
        assert_eq!(snapshot[0].text("code").as_deref(), Some("TXO18000C"));
        assert!(snapshot[0].decimal("close").is_some());

        session.disconnect().await;
    }

    #[test]
    fn fair_value_is_positive_and_monotonic_for_calls() {
        let deep = Contract::new("TXO17000C", Decimal::from(17_000), OptionType::Call);
        let atm = Contract::new("TXO18000C", Decimal::from(18_000), OptionType::Call);
        let otm = Contract::new("TXO19000C", Decimal::from(19_000), OptionType::Call);
        let (d, a, o) = (
            fair_value(&deep, 18_000.0, 100.0),
            fair_value(&atm, 18_000.0, 100.0),
            fair_value(&otm, 18_000.0, 100.0),
        );
        assert!(d > a && a > o && o > 0.0);
    }
}
