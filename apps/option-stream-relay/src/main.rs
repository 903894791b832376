//! Option Stream Relay Binary
//!
//! Starts the relay against the simulated trading session and forwards
//! records to the configured gateway.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin option-stream-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `SESSION_API_KEY` (or `API_KEY`): Trading session API key
//! - `SESSION_SECRET_KEY` (or `SECRET_KEY`): Trading session secret
//! - `GATEWAY_URL`: Downstream WebSocket gateway URL
//!
//! ## Optional
//! - `STRIKE_INTERVAL`: Strike spacing (default: 100)
//! - `ATM_RANGE`: Strikes on each side of ATM (default: 8)
//! - `OPTION_TYPES`: call | put | both (default: call)
//! - `UNDERLYING_CODE`: Instrument driving the ladder (default: TXFR1)
//! - `HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use option_stream_relay::infrastructure::gateway::{GatewayClient, GatewayConfig};
use option_stream_relay::infrastructure::health::{HealthServer, HealthServerState};
use option_stream_relay::infrastructure::session::{SimulatedSession, SimulatedSessionConfig};
use option_stream_relay::infrastructure::telemetry;
use option_stream_relay::{RelayConfig, StreamingOrchestrator, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting option stream relay");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Metrics unavailable");
    }

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let session = Arc::new(SimulatedSession::new(
        SimulatedSessionConfig {
            contract_root: config.strikes.contract_root.clone(),
            underlying_code: config.strikes.underlying_code.clone(),
            base_price: config.simulation.base_price,
            strike_interval: config.strikes.interval,
            tick_interval: config.simulation.tick_interval,
            ..SimulatedSessionConfig::default()
        },
        config.credentials.clone(),
    ));
    let gateway = Arc::new(GatewayClient::new(GatewayConfig::from_settings(
        &config.gateway,
    )));

    let health_port = config.server.health_port;
    let relay = Arc::new(StreamingOrchestrator::new(config, session, gateway));

    // Spawn health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&relay),
    ));
    let health_server = HealthServer::new(health_port, health_state, shutdown_token.clone());
    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    if let Err(e) = relay.start().await {
        tracing::error!(error = %e, "Relay failed to start");
        shutdown_token.cancel();
        let _ = health_task.await;
        return Err(e.into());
    }

    await_shutdown(shutdown_token).await;

    relay.stop().await;
    let _ = health_task.await;

    tracing::info!("Option stream relay stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        underlying = %config.strikes.underlying_code,
        interval = %config.strikes.interval,
        atm_range = config.strikes.atm_range,
        option_types = ?config.strikes.option_types,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        gateway_url = %config.gateway.url,
        refresh_ms = config.loops.refresh_interval.as_millis(),
        snapshot_secs = config.loops.snapshot_interval.as_secs(),
        heartbeat_secs = config.loops.heartbeat_interval.as_secs(),
        "Loop settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
