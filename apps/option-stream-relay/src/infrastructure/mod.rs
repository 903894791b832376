//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// In-process broadcast transport.
pub mod broadcast;

/// Contract catalog adapter.
pub mod catalog;

/// Configuration from the environment.
pub mod config;

/// Downstream WebSocket gateway client.
pub mod gateway;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Trading session adapters.
pub mod session;

/// OpenTelemetry tracing integration.
pub mod telemetry;
