//! Prometheus metrics for bookings, locks and the route cache.
//!
//! Counters are recorded through the `metrics` facade wherever the event
//! happens; without an installed recorder they are no-ops. The exporter is
//! started by the process entry point when an address is configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use freightline_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://0.0.0.0:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

pub use freightline_core::metrics::{
    BOOKING_CREATED, BOOKING_REF_ID_COLLISIONS, BOOKING_TRANSITION_DURATION, BOOKING_TRANSITIONS,
    LOCK_CONTENDED, ROUTE_CACHE_ERRORS, ROUTE_CACHE_HITS, ROUTE_CACHE_MISSES, STORE_ERRORS,
};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build or install the exporter.
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Describe every metric and start serving `/metrics`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the listener cannot bind or a
    /// recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        if self.started {
            return Ok(());
        }

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Install(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        self.started = true;
        tracing::info!(addr = %self.addr, "Metrics exporter listening");
        Ok(())
    }

    /// Returns `true` once the exporter is running.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }
}

/// Register metric descriptions with the installed recorder.
pub fn register_metrics() {
    describe_counter!(ROUTE_CACHE_HITS, "Route searches answered from cache");
    describe_counter!(ROUTE_CACHE_MISSES, "Route searches computed from the store");
    describe_counter!(
        ROUTE_CACHE_ERRORS,
        "Route cache failures degraded to a miss or no-op"
    );
    describe_counter!(BOOKING_CREATED, "Bookings committed");
    describe_counter!(
        BOOKING_REF_ID_COLLISIONS,
        "Booking references regenerated after a collision"
    );
    describe_counter!(BOOKING_TRANSITIONS, "Booking status transitions committed");
    describe_histogram!(
        BOOKING_TRANSITION_DURATION,
        "Time a booking transition held its lock"
    );
    describe_counter!(
        LOCK_CONTENDED,
        "Lock acquisitions refused because the resource was busy"
    );
    describe_counter!(STORE_ERRORS, "Store failures by kind");
}
