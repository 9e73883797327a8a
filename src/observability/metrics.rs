//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define runtime metrics (component starts/exits, shutdowns)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `runwright_components_started_total` (counter): by kind (server, application)
//! - `runwright_component_exits_total` (counter): by kind and result
//! - `runwright_shutdowns_total` (counter): by trigger
//! - `runwright_shutdown_errors_total` (counter): by kind
//! - `runwright_shutdown_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are low-cardinality: no server names

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::ObservabilityError;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), ObservabilityError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ObservabilityError::Metrics(e.to_string()))?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// A supervised component was launched.
pub fn record_component_started(kind: &'static str) {
    ::metrics::counter!("runwright_components_started_total", "kind" => kind).increment(1);
}

/// A supervised component's `run` returned.
pub fn record_component_exit(kind: &'static str, result: &'static str) {
    ::metrics::counter!(
        "runwright_component_exits_total",
        "kind" => kind,
        "result" => result
    )
    .increment(1);
}

/// The shutdown sequence finished.
pub fn record_shutdown(trigger: &'static str, duration: Duration) {
    ::metrics::counter!("runwright_shutdowns_total", "trigger" => trigger).increment(1);
    ::metrics::histogram!("runwright_shutdown_duration_seconds").record(duration.as_secs_f64());
}

/// A component's `shutdown` failed or ran past the deadline.
pub fn record_shutdown_error(kind: &'static str) {
    ::metrics::counter!("runwright_shutdown_errors_total", "kind" => kind).increment(1);
}
