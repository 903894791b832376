//! Trading Session Adapters
//!
//! Implementations of the [`TradingSession`](crate::application::ports::TradingSession)
//! port:
//!
//! - [`SimulatedSession`]: random-walk market used by the binary
//! - [`ScriptedSession`]: deterministic session for tests and local runs

mod scripted;
mod simulated;

pub use scripted::{ScriptedOp, ScriptedSession, SessionCall};
pub use simulated::{SimulatedSession, SimulatedSessionConfig};
