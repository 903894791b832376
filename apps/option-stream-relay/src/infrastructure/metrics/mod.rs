//! Prometheus Metrics Module
//!
//! Exposes relay metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Events**: feed events received, records emitted, dropped or malformed
//! - **Subscriptions**: active contracts, per-operation failures, reconcile latency
//! - **Snapshots**: per-contract snapshot failures
//! - **Gateway**: downstream link state and reconnects
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before `init_metrics` is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::EventKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Repeated calls return the handle installed by the first call.
///
/// # Errors
///
/// Returns `MetricsError::InstallFailed` if another recorder is already
/// installed.
pub fn init_metrics() -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;
    register_metrics();

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

/// Metrics initialization error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The global recorder could not be installed.
    #[error("failed to install Prometheus recorder: {0}")]
    InstallFailed(String),
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "option_relay_feed_events_total",
        "Raw events received from the trading session"
    );
    describe_counter!(
        "option_relay_events_emitted_total",
        "Records handed to the broadcast transport"
    );
    describe_counter!(
        "option_relay_events_dropped_total",
        "Records not delivered, by reason"
    );
    describe_counter!(
        "option_relay_malformed_events_total",
        "Raw events that could not be normalized"
    );

    describe_gauge!(
        "option_relay_subscriptions_active",
        "Contracts currently subscribed upstream"
    );
    describe_counter!(
        "option_relay_subscription_failures_total",
        "Per-contract subscribe/unsubscribe failures"
    );
    describe_histogram!(
        "option_relay_reconcile_duration_seconds",
        "Time spent applying one subscription diff"
    );
    describe_counter!(
        "option_relay_snapshot_failures_total",
        "Per-contract snapshot request failures"
    );

    describe_gauge!(
        "option_relay_underlying_price",
        "Latest accepted underlying price"
    );
    describe_gauge!(
        "option_relay_gateway_connected",
        "Downstream gateway link state (1 = connected)"
    );
    describe_counter!(
        "option_relay_gateway_reconnects_total",
        "Downstream gateway reconnection attempts"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a record was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Downstream link not live.
    Disconnected,
    /// Bounded queue full.
    QueueFull,
    /// Transport closed or failed.
    TransportError,
    /// In-process receiver fell behind.
    Lagged,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::QueueFull => "queue_full",
            Self::TransportError => "transport_error",
            Self::Lagged => "lagged",
        }
    }
}

/// Record a raw event received from the session.
pub fn record_feed_event(kind: EventKind) {
    counter!("option_relay_feed_events_total", "event_type" => kind.as_str()).increment(1);
}

/// Record a record handed to the broadcast transport.
pub fn record_emitted(kind: EventKind) {
    counter!("option_relay_events_emitted_total", "event_type" => kind.as_str()).increment(1);
}

/// Record undelivered records.
pub fn record_dropped(kind: EventKind, reason: DropReason, count: u64) {
    counter!(
        "option_relay_events_dropped_total",
        "event_type" => kind.as_str(),
        "reason" => reason.as_str()
    )
    .increment(count);
}

/// Record a raw event that could not be normalized.
pub fn record_malformed(kind: EventKind) {
    counter!("option_relay_malformed_events_total", "event_type" => kind.as_str()).increment(1);
}

/// Update the active subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("option_relay_subscriptions_active").set(count as f64);
}

/// Record a per-contract subscription failure.
pub fn record_subscription_failure(operation: &'static str) {
    counter!("option_relay_subscription_failures_total", "operation" => operation).increment(1);
}

/// Record the duration of one reconcile pass.
pub fn record_reconcile_duration(duration: Duration) {
    histogram!("option_relay_reconcile_duration_seconds").record(duration.as_secs_f64());
}

/// Record a per-contract snapshot failure.
pub fn record_snapshot_failure() {
    counter!("option_relay_snapshot_failures_total").increment(1);
}

/// Update the underlying price gauge.
pub fn set_underlying_price(price: f64) {
    gauge!("option_relay_underlying_price").set(price);
}

/// Update the gateway link gauge.
pub fn set_gateway_connected(connected: bool) {
    gauge!("option_relay_gateway_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a gateway reconnection attempt.
pub fn record_gateway_reconnect() {
    counter!("option_relay_gateway_reconnects_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_reason_as_str() {
        assert_eq!(DropReason::Disconnected.as_str(), "disconnected");
        assert_eq!(DropReason::QueueFull.as_str(), "queue_full");
        assert_eq!(DropReason::TransportError.as_str(), "transport_error");
        assert_eq!(DropReason::Lagged.as_str(), "lagged");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_feed_event(EventKind::Tick);
        record_dropped(EventKind::Snapshot, DropReason::Disconnected, 3);
        set_active_subscriptions(17);
        record_reconcile_duration(Duration::from_millis(5));
    }
}
