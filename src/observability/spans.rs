//! Tracing-backed observability handle.
//!
//! # Responsibilities
//! - Install the subscriber built by logging.rs as the process default
//! - Start the metrics exporter when configured
//! - Add the OTLP pipeline's layers in `otpl` mode
//! - Open the root span with service identity fields
//! - Shut down OTLP providers and flush file sinks on close, bounded by the
//!   shutdown deadline
//!
//! # Design Decisions
//! - The root span's error status uses tracing-opentelemetry's
//!   `otel.status_code` / `otel.status_message` fields, which become the
//!   exported span's status in `otpl` mode and plain fields elsewhere

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::field;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::lifecycle::Context;
use crate::config::ObservabilityMode;
use crate::observability::otlp::OtlpPipeline;
use crate::observability::{logging, metrics};
use crate::observability::{Observability, ObservabilityError, ObservabilitySettings, RootSpan};

/// Observability handle backed by the global tracing subscriber.
pub struct TracingObservability {
    service_name: String,
    service_version: String,
    instance_id: Uuid,
    files: Vec<Arc<File>>,
    otlp: Option<OtlpPipeline>,
    closed: AtomicBool,
}

impl TracingObservability {
    /// Build the sinks, install them as the global subscriber and start the
    /// metrics exporter.
    ///
    /// Fails if another global subscriber is already installed. In `otpl`
    /// mode this must run inside a Tokio runtime.
    pub fn init(settings: &ObservabilitySettings) -> Result<Self, ObservabilityError> {
        let mut sinks = logging::build_sinks(settings)?;

        let otlp = match settings.mode {
            ObservabilityMode::Otpl => {
                let pipeline = OtlpPipeline::new(settings)?;
                sinks.layers.extend(pipeline.layers(settings)?);
                Some(pipeline)
            }
            _ => None,
        };

        tracing_subscriber::registry()
            .with(sinks.layers)
            .try_init()
            .map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))?;

        if let Some(pipeline) = &otlp {
            pipeline.install_globals();
        }

        if let Some(addr) = settings.metrics_address {
            metrics::init_metrics(addr)?;
        }

        let instance_id = Uuid::new_v4();
        tracing::debug!(
            service = %settings.service_name,
            version = %settings.service_version,
            mode = ?settings.mode,
            instance_id = %instance_id,
            "Observability initialized"
        );

        Ok(Self {
            service_name: settings.service_name.clone(),
            service_version: settings.service_version.clone(),
            instance_id,
            files: sinks.files,
            otlp,
            closed: AtomicBool::new(false),
        })
    }

    /// Unique identifier of this process' run.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }
}

#[async_trait]
impl Observability for TracingObservability {
    fn root_span(&self) -> Box<dyn RootSpan> {
        let span = tracing::info_span!(
            "run",
            service.name = %self.service_name,
            service.version = %self.service_version,
            service.instance.id = %self.instance_id,
            error = field::Empty,
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
        );
        Box::new(TracingRootSpan { span })
    }

    async fn close(&self, ctx: &Context) -> Result<(), ObservabilityError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let files = self.files.clone();
        let otlp = self.otlp.clone();
        let flush = tokio::task::spawn_blocking(move || -> Result<(), ObservabilityError> {
            let exported = match &otlp {
                Some(pipeline) => pipeline.shutdown(),
                None => Ok(()),
            };
            std::io::stdout().flush()?;
            for file in &files {
                file.sync_all()?;
            }
            exported
        });

        tokio::select! {
            res = flush => match res {
                Ok(flushed) => flushed,
                Err(e) => Err(ObservabilityError::Io(std::io::Error::other(e))),
            },
            _ = ctx.cancelled() => Err(ObservabilityError::CloseTimeout),
        }
    }
}

/// Root span backed by a `tracing::Span`.
#[derive(Debug)]
pub struct TracingRootSpan {
    span: tracing::Span,
}

impl RootSpan for TracingRootSpan {
    fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    fn record_error(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.span.record("error", field::display(error));
        self.span.record("otel.status_code", "ERROR");
        self.span.record("otel.status_message", field::display(error));
    }

    fn end(self: Box<Self>) {
        tracing::debug!(parent: &self.span, "Root span closed");
    }
}
