//! Observability module providing logging and metrics.
//!
//! This module initializes and configures:
//! - Structured logging with configurable formats (pretty, compact, JSON)
//! - Prometheus counters for dump retention sweeps

#[cfg(test)]
pub(crate) mod log_capture;
pub mod metrics;
mod tracing_init;

pub use tracing_init::*;
