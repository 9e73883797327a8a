//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! FrameworkConfig + BuildInfo + DEBUG flag
//!     → ObservabilitySettings
//!     → logging.rs (log layer, debug stdout layer, span layer)
//!     → metrics.rs (Prometheus exporter, optional)
//!     → otlp.rs (OTLP exporters, `otpl` mode only)
//!     → spans.rs (TracingObservability: the explicit handle)
//!
//! Consumers:
//!     → Service opens one root span for Running..Terminated
//!     → Service closes the handle under the shutdown deadline
//! ```
//!
//! # Design Decisions
//! - The handle is passed explicitly into the orchestrator, never looked up
//!   globally, so tests inject a fake
//! - Log channels are tracing targets; per-channel levels become `EnvFilter`
//!   directives
//! - `stdout` and `file` modes write span open/close records as JSON lines;
//!   `otpl` mode exports spans and log events over OTLP/gRPC instead

pub mod logging;
pub mod metrics;
pub mod otlp;
pub mod spans;

use std::net::SocketAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{FrameworkConfig, LoggingConfig, ObservabilityMode};
use crate::lifecycle::Context;

pub use spans::{TracingObservability, TracingRootSpan};

/// Errors raised while initializing or closing observability sinks.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// A level or channel directive was rejected by `EnvFilter`.
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("log sink error: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber was installed before us.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("metrics exporter error: {0}")]
    Metrics(String),

    /// An OTLP exporter could not be built or shut down cleanly.
    #[error("OTLP exporter error: {0}")]
    Exporter(String),

    #[error("observability did not close before the deadline")]
    CloseTimeout,
}

/// Handle to the process' observability sinks.
#[async_trait]
pub trait Observability: Send + Sync {
    /// Open the span that covers the Running..Terminated interval.
    fn root_span(&self) -> Box<dyn RootSpan>;

    /// Flush and close sinks, giving up when `ctx` expires.
    async fn close(&self, ctx: &Context) -> Result<(), ObservabilityError>;
}

/// The single root span of a service run.
pub trait RootSpan: Send {
    /// The span itself. Component tasks link to it; it closes on
    /// [`end`](Self::end) once the supervisor's own clones are dropped.
    fn span(&self) -> tracing::Span;

    /// Attach the error that ended the run and mark the span as failed.
    fn record_error(&mut self, error: &(dyn std::error::Error + 'static));

    /// Close the span.
    fn end(self: Box<Self>);
}

/// Inputs for building the observability sinks.
#[derive(Debug, Clone)]
pub struct ObservabilitySettings {
    pub service_name: String,
    pub service_version: String,
    pub logging: LoggingConfig,
    pub mode: ObservabilityMode,
    /// Force debug-level logging to stdout regardless of `logging.level`.
    pub debug_stdout: bool,
    pub metrics_address: Option<SocketAddr>,
    /// Target file for `ObservabilityMode::File`.
    pub trace_file: PathBuf,
    /// Collector endpoint for `ObservabilityMode::Otpl`; the exporter's
    /// environment defaults apply when unset.
    pub otlp_endpoint: Option<String>,
}

impl ObservabilitySettings {
    /// Derive settings from a validated framework sub-record.
    pub fn from_framework(config: &FrameworkConfig, debug_stdout: bool) -> Self {
        Self {
            service_name: config.service_name.clone(),
            service_version: config.service_version().to_string(),
            logging: config.logging.clone(),
            mode: config.observability_mode,
            debug_stdout,
            metrics_address: config
                .metrics_address
                .as_deref()
                .and_then(|a| a.parse().ok()),
            trace_file: PathBuf::from("traces.json"),
            otlp_endpoint: config.otlp_endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildInfo;

    #[test]
    fn settings_from_framework() {
        let config = FrameworkConfig {
            service_name: "orders".into(),
            metrics_address: Some("127.0.0.1:9100".into()),
            observability_mode: ObservabilityMode::File,
            otlp_endpoint: Some("http://collector:4317".into()),
            build_info: Some(BuildInfo::new("2.0.1", "deadbeef", "2026-03-01")),
            ..Default::default()
        };

        let settings = ObservabilitySettings::from_framework(&config, true);
        assert_eq!(settings.service_name, "orders");
        assert_eq!(settings.service_version, "2.0.1");
        assert_eq!(settings.mode, ObservabilityMode::File);
        assert!(settings.debug_stdout);
        assert_eq!(settings.otlp_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(
            settings.metrics_address,
            Some("127.0.0.1:9100".parse().unwrap())
        );
    }
}
