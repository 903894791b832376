//! Application Layer - Use cases and port definitions.
//!
//! Ports describe the upstream session, the contract catalog and the
//! downstream broadcast transport; services implement the relay's use cases
//! against those ports.

/// Port definitions (interfaces for adapters).
pub mod ports;

/// Application services (use case orchestration).
pub mod services;
