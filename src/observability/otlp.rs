//! OTLP export for `otpl` mode.
//!
//! # Responsibilities
//! - Build OTLP/gRPC exporters for traces, logs and metrics
//! - Tag every signal with service name, service version and host name
//! - Bridge tracing spans and events into the OpenTelemetry providers
//! - Shut every provider down, flushing what is still buffered
//!
//! # Design Decisions
//! - Endpoint comes from `framework.otlp_endpoint`, else the standard
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` environment variable
//! - Exporter crates' own logs are kept out of the log bridge, otherwise
//!   every export would produce records to export
//! - `OTEL_SDK_DISABLED=true` drops the log bridge; spans are still exported
//! - Runtime metrics stay on the Prometheus endpoint; the meter provider is
//!   installed globally for application instruments

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::Layer;

use crate::observability::logging::{build_filter, BoxedLayer};
use crate::observability::{ObservabilityError, ObservabilitySettings};

/// Targets never forwarded through the log bridge.
const EXPORTER_TARGETS: &[&str] = &["hyper", "h2", "tonic", "tower", "opentelemetry"];

/// The three OpenTelemetry providers behind `otpl` mode.
#[derive(Debug, Clone)]
pub struct OtlpPipeline {
    resource: Resource,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: SdkLoggerProvider,
}

impl OtlpPipeline {
    /// Build exporters and providers. Must run inside a Tokio runtime; the
    /// exporters connect lazily, so an unreachable collector is not an error
    /// here.
    pub fn new(settings: &ObservabilitySettings) -> Result<Self, ObservabilityError> {
        let resource = resource(settings);
        let endpoint = settings.otlp_endpoint.as_deref();

        let mut spans = SpanExporter::builder().with_tonic();
        if let Some(endpoint) = endpoint {
            spans = spans.with_endpoint(endpoint);
        }
        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(spans.build().map_err(exporter_error)?)
            .build();

        let mut metrics = MetricExporter::builder().with_tonic();
        if let Some(endpoint) = endpoint {
            metrics = metrics.with_endpoint(endpoint);
        }
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_periodic_exporter(metrics.build().map_err(exporter_error)?)
            .build();

        let mut logs = LogExporter::builder().with_tonic();
        if let Some(endpoint) = endpoint {
            logs = logs.with_endpoint(endpoint);
        }
        let logger_provider = SdkLoggerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(logs.build().map_err(exporter_error)?)
            .build();

        Ok(Self {
            resource,
            tracer_provider,
            meter_provider,
            logger_provider,
        })
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Register the providers and the W3C trace-context propagator as the
    /// process-wide OpenTelemetry defaults.
    pub fn install_globals(&self) {
        global::set_tracer_provider(self.tracer_provider.clone());
        global::set_meter_provider(self.meter_provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());
    }

    /// Subscriber layers feeding the providers: spans always, log events
    /// unless the SDK is disabled.
    pub fn layers(&self, settings: &ObservabilitySettings) -> Result<Vec<BoxedLayer>, ObservabilityError> {
        let tracer = self.tracer_provider.tracer(settings.service_name.clone());
        let mut layers: Vec<BoxedLayer> =
            vec![tracing_opentelemetry::layer().with_tracer(tracer).boxed()];

        if !sdk_disabled() {
            let mut filter = build_filter(settings.logging.level, &settings.logging.filtered_channels)?;
            for target in EXPORTER_TARGETS {
                let directive = format!("{}=off", target)
                    .parse::<Directive>()
                    .map_err(|e| ObservabilityError::Filter(e.to_string()))?;
                filter = filter.add_directive(directive);
            }
            layers.push(
                OpenTelemetryTracingBridge::new(&self.logger_provider)
                    .with_filter(filter)
                    .boxed(),
            );
        }

        Ok(layers)
    }

    /// Flush and shut down every provider. Blocks; run it off the async
    /// workers.
    pub fn shutdown(&self) -> Result<(), ObservabilityError> {
        let mut failures = Vec::new();
        if let Err(e) = self.tracer_provider.shutdown() {
            failures.push(format!("traces: {}", e));
        }
        if let Err(e) = self.meter_provider.shutdown() {
            failures.push(format!("metrics: {}", e));
        }
        if let Err(e) = self.logger_provider.shutdown() {
            failures.push(format!("logs: {}", e));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ObservabilityError::Exporter(failures.join("; ")))
        }
    }
}

/// Resource attributes shared by every signal.
pub fn resource(settings: &ObservabilitySettings) -> Resource {
    let mut attributes = vec![KeyValue::new(
        "service.version",
        settings.service_version.clone(),
    )];
    if let Some(host) = host_name() {
        attributes.push(KeyValue::new("host.name", host));
    }

    Resource::builder()
        .with_service_name(settings.service_name.clone())
        .with_attributes(attributes)
        .build()
}

/// Best-effort host name: `HOSTNAME`, then `/etc/hostname`.
fn host_name() -> Option<String> {
    let from_env = std::env::var("HOSTNAME").ok();
    let name = from_env.or_else(|| std::fs::read_to_string("/etc/hostname").ok())?;
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn sdk_disabled() -> bool {
    std::env::var("OTEL_SDK_DISABLED").is_ok_and(|v| v == "true")
}

fn exporter_error(e: impl std::fmt::Display) -> ObservabilityError {
    ObservabilityError::Exporter(e.to_string())
}
