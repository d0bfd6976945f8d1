//! Prometheus metrics for dump retention.
//!
//! Provides counters for:
//! - Scheduled sweeps run
//! - Dump files deleted
//! - Sweep errors, by kind (`enumerate`, `delete`)
//!
//! Without the `prometheus` feature every recording function is a no-op.

#[cfg(feature = "prometheus")]
use metrics::counter;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Install the Prometheus recorder and its scrape endpoint.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()?;

    tracing::info!(listen = %config.listen, "Prometheus metrics endpoint started");
    Ok(())
}

/// Without the `prometheus` feature, enabling metrics is reported as an error.
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        return Err(MetricsError::Setup(
            "observability.metrics.enabled requires the 'prometheus' feature. \
             Rebuild with: cargo build --features prometheus"
                .into(),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a scheduled sweep.
///
/// Counted once per scheduler tick, including sweeps that failed to list the
/// directory, so it tracks `SchedulerStatus::sweeps_completed`. One-off sweeps
/// run outside the scheduler are not counted.
pub fn record_sweep() {
    #[cfg(feature = "prometheus")]
    counter!("dump_retention_sweeps_total").increment(1);
}

/// Record dump files deleted by a sweep.
pub fn record_dump_deletions(count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("dump_retention_deletions_total").increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = count;
    }
}

/// Record a sweep error.
///
/// # Arguments
/// * `kind` - `enumerate` when the directory could not be listed,
///   `delete` when a single file could not be removed
pub fn record_sweep_error(kind: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "dump_retention_errors_total",
            "kind" => kind.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = kind;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
