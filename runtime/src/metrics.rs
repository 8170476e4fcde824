//! Prometheus metrics for observability and monitoring.
//!
//! This module registers descriptions for the metric families emitted by the
//! refetch components and exposes them for scraping:
//! - Operation lifecycle (triggers, settlements, dropped results, disposals)
//! - Pipeline dispatch (requests, failures by kind, re-authentication)
//!
//! Recording happens inline at the call sites (`refetch-runtime`'s operation
//! module and `refetch-pipeline`'s dispatch path); this module only describes
//! the families and serves the rendered output.
//!
//! # Example
//!
//! ```rust,no_run
//! use refetch_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
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
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Initialize metrics and start the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns error if metrics exporter cannot be installed or server cannot bind.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this will
    /// log a warning and continue rather than fail. In production, ensure this
    /// is only called once.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        // Register all metric descriptions
        register_metrics();

        // Build and install the Prometheus exporter
        let builder = PrometheusBuilder::new()
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        // Try to install the recorder
        // In tests, this may fail if a recorder is already installed
        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    // In tests, multiple MetricsServer instances may be created
                    // We'll allow this but warn about it
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Operation Metrics
    describe_counter!(
        "operation.triggers.total",
        "Total number of invocations started by triggers"
    );
    describe_counter!(
        "operation.settlements.total",
        "Total number of invocation results applied to operation state, by outcome"
    );
    describe_counter!(
        "operation.results.dropped",
        "Total number of invocation results dropped without touching state, by reason"
    );
    describe_counter!(
        "operation.disposals.total",
        "Total number of operations disposed"
    );
    describe_counter!(
        "operation.disposed.rejected_triggers",
        "Total number of triggers rejected because the operation was disposed"
    );
    describe_histogram!(
        "operation.invocation.duration_seconds",
        "Time from trigger to settlement of the bound function"
    );

    // Pipeline Metrics
    describe_counter!(
        "pipeline.requests.total",
        "Total number of requests dispatched through the pipeline"
    );
    describe_counter!(
        "pipeline.requests.failed",
        "Total number of requests that produced a classified failure, by kind"
    );
    describe_counter!(
        "pipeline.reauth.attempts",
        "Total number of re-authentication attempts triggered by 401 responses"
    );
    describe_counter!(
        "pipeline.reauth.recovered",
        "Total number of requests that succeeded after re-authentication"
    );
    describe_counter!(
        "pipeline.hooks.recovered",
        "Total number of failures converted to successes by response hooks"
    );
    describe_histogram!(
        "pipeline.request.duration_seconds",
        "Time taken by one send, including hooks and any re-auth retry"
    );
}
