//! Prometheus metrics for observability and monitoring.
//!
//! Metrics are emitted through the `metrics` facade everywhere in the
//! workspace; nothing is recorded until [`MetricsExporter::install`] installs
//! the Prometheus recorder at the composition root.
//!
//! # Example
//!
//! ```rust,no_run
//! use yatra_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! println!("{}", exporter.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder wrapper.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one global recorder can exist per process. A second install is
    /// logged and treated as success so tests can share a process.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the exporter hasn't been installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Transactions
    describe_counter!(
        "yatra_transactions_total",
        "Transactions run, labelled by body and outcome"
    );
    describe_counter!(
        "yatra_transaction_retries_total",
        "Transaction attempts rerun after a retryable failure"
    );
    describe_histogram!(
        "yatra_transaction_duration_seconds",
        "Wall time of a transaction including retries"
    );
    describe_counter!("yatra_retry_attempts_total", "Retries scheduled by the backoff loop");
    describe_counter!(
        "yatra_retry_exhausted_total",
        "Operations that failed after exhausting their retries"
    );

    // Cancellations
    describe_counter!(
        "yatra_cancellations_total",
        "Cancellations committed, labelled full or partial"
    );
    describe_counter!(
        "yatra_restores_total",
        "Cancellation reversals, labelled merged, snapshot or reconstructed"
    );

    // Room allotment
    describe_counter!(
        "yatra_rooms_assigned_total",
        "Rooms filled by allotment, labelled standard or two_sharing"
    );
    describe_counter!(
        "yatra_room_update_failures_total",
        "Per-registration room updates that failed inside a batch"
    );

    // Payments
    describe_counter!(
        "yatra_payment_edits_total",
        "Payment edits committed, labelled by edit"
    );
}
