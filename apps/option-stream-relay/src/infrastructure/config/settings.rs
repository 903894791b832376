//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! Optional values fall back to explicit defaults; a value that is present
//! but unparsable (or zero where zero is meaningless) is an error. Missing
//! credentials are collected rather than failed on, so startup validation
//! can report all of them at once.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::contract::OptionType;

/// Trading session credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
    ca_cert_path: Option<String>,
    ca_password: Option<String>,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(
        api_key: String,
        secret_key: String,
        ca_cert_path: Option<String>,
        ca_password: Option<String>,
    ) -> Self {
        Self {
            api_key,
            secret_key,
            ca_cert_path,
            ca_password,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the secret key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Path to the order-signing certificate, if configured.
    #[must_use]
    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert_path.as_deref()
    }

    /// Certificate password, if configured.
    #[must_use]
    pub fn ca_password(&self) -> Option<&str> {
        self.ca_password.as_deref()
    }

    /// Names of required credential variables that are empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push(API_KEY_VARS[0]);
        }
        if self.secret_key.is_empty() {
            missing.push(SECRET_KEY_VARS[0]);
        }
        missing
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("ca_password", &self.ca_password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Strike ladder and contract selection settings.
#[derive(Debug, Clone)]
pub struct StrikeSettings {
    /// Spacing between listed strikes.
    pub interval: Decimal,
    /// Strikes tracked on each side of the ATM strike.
    pub atm_range: u32,
    /// Option types subscribed at every strike.
    pub option_types: Vec<OptionType>,
    /// Code of the instrument whose price drives the ladder.
    pub underlying_code: String,
    /// Contract code root.
    pub contract_root: String,
}

impl Default for StrikeSettings {
    fn default() -> Self {
        Self {
            interval: Decimal::from(100),
            atm_range: 8,
            option_types: vec![OptionType::Call],
            underlying_code: "TXFR1".to_string(),
            contract_root: "TXO".to_string(),
        }
    }
}

/// Loop cadences and session call bounds.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Subscription refresh cadence.
    pub refresh_interval: Duration,
    /// Snapshot poll cadence.
    pub snapshot_interval: Duration,
    /// Heartbeat cadence.
    pub heartbeat_interval: Duration,
    /// Timeout for each subscribe/unsubscribe/snapshot call.
    pub call_timeout: Duration,
    /// Bound on waiting for loops during shutdown.
    pub shutdown_timeout: Duration,
    /// Capacity of each per-event-type feed queue.
    pub feed_capacity: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(1_000),
            snapshot_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            call_timeout: Duration::from_millis(3_000),
            shutdown_timeout: Duration::from_secs(5),
            feed_capacity: 4_096,
        }
    }
}

/// Downstream gateway settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// WebSocket URL. Empty when not configured.
    pub url: String,
    /// Outbound queue capacity.
    pub queue_capacity: usize,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Ping interval.
    pub ping_interval: Duration,
    /// Pong timeout before the link is considered dead.
    pub pong_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            queue_capacity: 10_000,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(20),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Simulated market settings.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Starting underlying price.
    pub base_price: Decimal,
    /// Market event cadence.
    pub tick_interval: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            base_price: Decimal::from(18_000),
            tick_interval: Duration::from_millis(500),
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Session credentials.
    pub credentials: Credentials,
    /// Strike and contract selection.
    pub strikes: StrikeSettings,
    /// Loop cadences.
    pub loops: LoopSettings,
    /// Downstream gateway.
    pub gateway: GatewaySettings,
    /// Server ports.
    pub server: ServerSettings,
    /// Simulated market.
    pub simulation: SimulationSettings,
}

const API_KEY_VARS: [&str; 2] = ["SESSION_API_KEY", "API_KEY"];
const SECRET_KEY_VARS: [&str; 2] = ["SESSION_SECRET_KEY", "SECRET_KEY"];
const GATEWAY_URL_VAR: &str = "GATEWAY_URL";

/// Widest ATM window accepted, in strikes per side.
pub const MAX_ATM_RANGE: u32 = 100;

impl RelayConfig {
    /// Create configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an optional variable is set to
    /// an unusable value. Missing credentials are not an error here; see
    /// [`RelayConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an optional variable is set to
    /// an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let credentials = Credentials::new(
            env.first(&API_KEY_VARS).unwrap_or_default(),
            env.first(&SECRET_KEY_VARS).unwrap_or_default(),
            env.get("CA_CERT_PATH"),
            env.get("CA_PASSWORD"),
        );

        let strike_defaults = StrikeSettings::default();
        let strikes = StrikeSettings {
            interval: env.positive("STRIKE_INTERVAL", strike_defaults.interval)?,
            atm_range: atm_range(env.parse("ATM_RANGE", strike_defaults.atm_range)?)?,
            option_types: match env.get("OPTION_TYPES") {
                Some(value) => parse_option_types(&value).ok_or(ConfigError::InvalidValue {
                    key: "OPTION_TYPES",
                    value,
                })?,
                None => strike_defaults.option_types,
            },
            underlying_code: env
                .get("UNDERLYING_CODE")
                .unwrap_or(strike_defaults.underlying_code),
            contract_root: env
                .get("CONTRACT_ROOT")
                .unwrap_or(strike_defaults.contract_root),
        };

        let loop_defaults = LoopSettings::default();
        let loops = LoopSettings {
            refresh_interval: env.millis("REFRESH_INTERVAL_MS", loop_defaults.refresh_interval)?,
            snapshot_interval: env.secs("SNAPSHOT_INTERVAL_SECS", loop_defaults.snapshot_interval)?,
            heartbeat_interval: env
                .secs("HEARTBEAT_INTERVAL_SECS", loop_defaults.heartbeat_interval)?,
            call_timeout: env.millis("SESSION_CALL_TIMEOUT_MS", loop_defaults.call_timeout)?,
            shutdown_timeout: env.secs("SHUTDOWN_TIMEOUT_SECS", loop_defaults.shutdown_timeout)?,
            feed_capacity: env.positive("FEED_QUEUE_CAPACITY", loop_defaults.feed_capacity)?,
        };

        let gateway_defaults = GatewaySettings::default();
        let multiplier: f64 = env.parse(
            "GATEWAY_RECONNECT_DELAY_MULTIPLIER",
            gateway_defaults.reconnect_delay_multiplier,
        )?;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "GATEWAY_RECONNECT_DELAY_MULTIPLIER",
                value: multiplier.to_string(),
            });
        }
        let gateway = GatewaySettings {
            url: env.get(GATEWAY_URL_VAR).unwrap_or_default(),
            queue_capacity: env.positive("GATEWAY_QUEUE_CAPACITY", gateway_defaults.queue_capacity)?,
            reconnect_delay_initial: env.millis(
                "GATEWAY_RECONNECT_DELAY_INITIAL_MS",
                gateway_defaults.reconnect_delay_initial,
            )?,
            reconnect_delay_max: env.secs(
                "GATEWAY_RECONNECT_DELAY_MAX_SECS",
                gateway_defaults.reconnect_delay_max,
            )?,
            reconnect_delay_multiplier: multiplier,
            max_reconnect_attempts: env.parse(
                "GATEWAY_MAX_RECONNECT_ATTEMPTS",
                gateway_defaults.max_reconnect_attempts,
            )?,
            ping_interval: env.secs("GATEWAY_PING_INTERVAL_SECS", gateway_defaults.ping_interval)?,
            pong_timeout: env.secs("GATEWAY_PONG_TIMEOUT_SECS", gateway_defaults.pong_timeout)?,
        };

        let server = ServerSettings {
            health_port: env.positive("HEALTH_PORT", ServerSettings::default().health_port)?,
        };

        let simulation_defaults = SimulationSettings::default();
        let simulation = SimulationSettings {
            base_price: env.positive("SIM_BASE_PRICE", simulation_defaults.base_price)?,
            tick_interval: env.millis("SIM_TICK_INTERVAL_MS", simulation_defaults.tick_interval)?,
        };

        Ok(Self {
            credentials,
            strikes,
            loops,
            gateway,
            server,
            simulation,
        })
    }

    /// Names of required variables that are missing.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = self.credentials.missing();
        if self.gateway.url.is_empty() {
            missing.push(GATEWAY_URL_VAR);
        }
        missing
    }

    /// Check that every required value is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` naming every missing variable,
    /// or `ConfigError::InvalidValue` if the ATM window exceeds
    /// [`MAX_ATM_RANGE`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVar(missing.join(", ")));
        }
        atm_range(self.strikes.atm_range).map(|_| ())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variables are missing.
    #[error("missing required environment variable(s): {0}")]
    MissingEnvVar(String),
    /// Variable is set but unusable.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

fn atm_range(range: u32) -> Result<u32, ConfigError> {
    if range > MAX_ATM_RANGE {
        return Err(ConfigError::InvalidValue {
            key: "ATM_RANGE",
            value: range.to_string(),
        });
    }
    Ok(range)
}

/// Parse `call`, `put` or `both` (case-insensitive; `c`, `p`, `calls`, `puts`
/// and `call,put` also accepted).
fn parse_option_types(value: &str) -> Option<Vec<OptionType>> {
    if value.eq_ignore_ascii_case("both") || value.eq_ignore_ascii_case("all") {
        return Some(vec![OptionType::Call, OptionType::Put]);
    }
    let mut types = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let option_type = match part.to_ascii_lowercase().as_str() {
            "call" | "calls" | "c" => OptionType::Call,
            "put" | "puts" | "p" => OptionType::Put,
            _ => return None,
        };
        if !types.contains(&option_type) {
            types.push(option_type);
        }
    }
    (!types.is_empty()).then_some(types)
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k))
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key, value }),
            None => Ok(default),
        }
    }

    fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + ToString,
    {
        let value = self.parse(key, default)?;
        if value > T::default() {
            Ok(value)
        } else {
            Err(ConfigError::InvalidValue {
                key,
                value: value.to_string(),
            })
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.positive(key, default_ms).map(Duration::from_millis)
    }

    fn secs(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.positive(key, default.as_secs()).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SESSION_API_KEY", "key123"),
            ("SESSION_SECRET_KEY", "secret456"),
            ("GATEWAY_URL", "ws://localhost:3001/relay"),
        ]
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = RelayConfig::from_lookup(lookup(&complete())).unwrap();
        assert_eq!(config.strikes.interval, Decimal::from(100));
        assert_eq!(config.strikes.atm_range, 8);
        assert_eq!(config.strikes.option_types, vec![OptionType::Call]);
        assert_eq!(config.strikes.underlying_code, "TXFR1");
        assert_eq!(config.strikes.contract_root, "TXO");
        assert_eq!(config.loops.refresh_interval, Duration::from_millis(1_000));
        assert_eq!(config.loops.snapshot_interval, Duration::from_secs(5));
        assert_eq!(config.loops.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.loops.call_timeout, Duration::from_millis(3_000));
        assert_eq!(config.loops.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.loops.feed_capacity, 4_096);
        assert_eq!(config.gateway.queue_capacity, 10_000);
        assert_eq!(config.server.health_port, 8083);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fallback_credential_names() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("API_KEY", "fallback-key"),
            ("SECRET_KEY", "fallback-secret"),
        ]))
        .unwrap();
        assert_eq!(config.credentials.api_key(), "fallback-key");
        assert_eq!(config.credentials.secret_key(), "fallback-secret");
    }

    #[test]
    fn missing_required_values_are_all_reported() {
        let config = RelayConfig::from_lookup(lookup(&[("SESSION_SECRET_KEY", "  ")])).unwrap();
        assert_eq!(
            config.missing_required(),
            vec!["SESSION_API_KEY", "SESSION_SECRET_KEY", "GATEWAY_URL"]
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(
                "SESSION_API_KEY, SESSION_SECRET_KEY, GATEWAY_URL".to_string()
            ))
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = complete();
        vars.extend([
            ("STRIKE_INTERVAL", "50"),
            ("ATM_RANGE", "3"),
            ("OPTION_TYPES", "both"),
            ("REFRESH_INTERVAL_MS", "250"),
            ("HEALTH_PORT", "9000"),
            ("CA_CERT_PATH", "/certs/sinopac.pfx"),
        ]);
        let config = RelayConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.strikes.interval, Decimal::from(50));
        assert_eq!(config.strikes.atm_range, 3);
        assert_eq!(
            config.strikes.option_types,
            vec![OptionType::Call, OptionType::Put]
        );
        assert_eq!(config.loops.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.server.health_port, 9000);
        assert_eq!(config.credentials.ca_cert_path(), Some("/certs/sinopac.pfx"));
    }

    #[test_case("STRIKE_INTERVAL", "0" ; "zero strike interval")]
    #[test_case("STRIKE_INTERVAL", "-100" ; "negative strike interval")]
    #[test_case("ATM_RANGE", "eight" ; "unparsable range")]
    #[test_case("ATM_RANGE", "4294967295" ; "unbounded range")]
    #[test_case("ATM_RANGE", "101" ; "range above limit")]
    #[test_case("OPTION_TYPES", "straddle" ; "unknown option type")]
    #[test_case("REFRESH_INTERVAL_MS", "0" ; "zero refresh interval")]
    #[test_case("FEED_QUEUE_CAPACITY", "0" ; "zero feed capacity")]
    #[test_case("HEALTH_PORT", "70000" ; "port out of range")]
    #[test_case("GATEWAY_RECONNECT_DELAY_MULTIPLIER", "0.5" ; "shrinking backoff")]
    fn invalid_values_are_rejected(key: &str, value: &str) {
        let mut vars = complete();
        vars.push((key, value));
        let err = RelayConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn validate_rejects_oversized_window() {
        let mut config = RelayConfig::from_lookup(lookup(&complete())).unwrap();
        config.strikes.atm_range = MAX_ATM_RANGE;
        assert_eq!(config.validate(), Ok(()));

        config.strikes.atm_range = MAX_ATM_RANGE + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "ATM_RANGE", .. })
        ));
    }

    #[test_case("call", &[OptionType::Call])]
    #[test_case("PUT", &[OptionType::Put])]
    #[test_case("Both", &[OptionType::Call, OptionType::Put])]
    #[test_case("put, call", &[OptionType::Put, OptionType::Call])]
    fn option_type_selection(value: &str, expected: &[OptionType]) {
        assert_eq!(parse_option_types(value).unwrap(), expected);
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new(
            "key123".to_string(),
            "secret456".to_string(),
            None,
            Some("hunter2".to_string()),
        );
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
