//! Structured logging.
//!
//! # Responsibilities
//! - Build the subscriber layers from [`ObservabilitySettings`]
//! - Translate level + channel overrides into `EnvFilter` directives
//! - Route span open/close records according to the observability mode
//!   (`otpl` span export lives in otlp.rs)
//!
//! # Design Decisions
//! - Uses tracing-subscriber's registry with per-layer filters, so the debug
//!   stdout layer and the configured sink can disagree on verbosity
//! - JSON format for machine parsing, text for development
//! - File sinks are kept so `close` can flush them

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::{self, format::FmtSpan, writer::BoxMakeWriter};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LogLevel, LogOutput, ObservabilityMode};
use crate::observability::{ObservabilityError, ObservabilitySettings};

/// A type-erased layer over the registry.
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Layers ready to install, plus the files they write to.
pub struct Sinks {
    pub layers: Vec<BoxedLayer>,
    pub files: Vec<Arc<File>>,
}

/// Build an `EnvFilter` from a base level and per-channel overrides.
pub fn build_filter(
    level: LogLevel,
    channels: &BTreeMap<String, LogLevel>,
) -> Result<EnvFilter, ObservabilityError> {
    let mut directives = vec![level.as_str().to_string()];
    directives.extend(
        channels
            .iter()
            .map(|(channel, level)| format!("{}={}", channel, level)),
    );

    EnvFilter::builder()
        .parse(directives.join(","))
        .map_err(|e| ObservabilityError::Filter(e.to_string()))
}

/// Build every layer the settings ask for.
pub fn build_sinks(settings: &ObservabilitySettings) -> Result<Sinks, ObservabilityError> {
    let logging = &settings.logging;
    let mut layers = Vec::new();
    let mut files = Vec::new();

    // Debug-to-stdout either lowers the stdout sink's level or adds a sink.
    let mut level = logging.level;
    let mut extra_stdout = false;
    if settings.debug_stdout {
        if logging.output == LogOutput::Stdout {
            level = level.min(LogLevel::Debug);
        } else {
            extra_stdout = true;
        }
    }

    let (writer, file) = open_writer(logging.output, Path::new(&logging.file_path))?;
    files.extend(file);
    let ansi = logging.output != LogOutput::File;
    layers.push(fmt_layer(
        logging.format,
        writer,
        ansi,
        build_filter(level, &logging.filtered_channels)?,
    ));

    if extra_stdout {
        layers.push(fmt_layer(
            LogFormat::Text,
            BoxMakeWriter::new(std::io::stdout),
            true,
            build_filter(LogLevel::Debug, &logging.filtered_channels)?,
        ));
    }

    match settings.mode {
        ObservabilityMode::Stdout => {
            layers.push(span_layer(BoxMakeWriter::new(std::io::stdout)));
        }
        ObservabilityMode::File => {
            let (writer, file) = open_writer(LogOutput::File, &settings.trace_file)?;
            files.extend(file);
            layers.push(span_layer(writer));
        }
        ObservabilityMode::Disabled | ObservabilityMode::Otpl => {}
    }

    Ok(Sinks { layers, files })
}

fn open_writer(
    output: LogOutput,
    path: &Path,
) -> Result<(BoxMakeWriter, Option<Arc<File>>), ObservabilityError> {
    match output {
        LogOutput::Stdout => Ok((BoxMakeWriter::new(std::io::stdout), None)),
        LogOutput::Stderr => Ok((BoxMakeWriter::new(std::io::stderr), None)),
        LogOutput::File => {
            let file = Arc::new(OpenOptions::new().create(true).append(true).open(path)?);
            Ok((BoxMakeWriter::new(Arc::clone(&file)), Some(file)))
        }
    }
}

fn fmt_layer(format: LogFormat, writer: BoxMakeWriter, ansi: bool, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

/// Emits one JSON record when a span opens and one when it closes; plain
/// events are left to the log layers.
fn span_layer(writer: BoxMakeWriter) -> BoxedLayer {
    fmt::layer()
        .json()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(writer)
        .with_filter(filter_fn(|meta| meta.is_span()))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;
    use std::path::PathBuf;

    fn settings(logging: LoggingConfig, mode: ObservabilityMode, debug: bool) -> ObservabilitySettings {
        ObservabilitySettings {
            service_name: "test".into(),
            service_version: "dev".into(),
            logging,
            mode,
            debug_stdout: debug,
            metrics_address: None,
            trace_file: PathBuf::from("traces.json"),
            otlp_endpoint: None,
        }
    }

    #[test]
    fn filter_includes_channels() {
        let mut channels = BTreeMap::new();
        channels.insert("hyper".to_string(), LogLevel::Warn);
        channels.insert("runwright::service".to_string(), LogLevel::Trace);

        let filter = build_filter(LogLevel::Info, &channels).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("hyper=warn"));
        assert!(rendered.contains("runwright::service=trace"));
        assert!(rendered.contains("info"));
    }

    #[test]
    fn stdout_sink_only_by_default() {
        let sinks = build_sinks(&settings(
            LoggingConfig::default(),
            ObservabilityMode::Disabled,
            false,
        ))
        .unwrap();
        assert_eq!(sinks.layers.len(), 1);
        assert!(sinks.files.is_empty());
    }

    #[test]
    fn debug_flag_adds_stdout_sink_when_logging_elsewhere() {
        let logging = LoggingConfig {
            output: LogOutput::Stderr,
            ..Default::default()
        };
        let sinks = build_sinks(&settings(logging, ObservabilityMode::Disabled, true)).unwrap();
        assert_eq!(sinks.layers.len(), 2);

        let sinks = build_sinks(&settings(
            LoggingConfig::default(),
            ObservabilityMode::Disabled,
            true,
        ))
        .unwrap();
        assert_eq!(sinks.layers.len(), 1);
    }

    #[test]
    fn file_sinks_are_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let logging = LoggingConfig {
            output: LogOutput::File,
            file_path: dir.path().join("service.log").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let mut s = settings(logging, ObservabilityMode::File, false);
        s.trace_file = dir.path().join("traces.json");

        let sinks = build_sinks(&s).unwrap();
        assert_eq!(sinks.layers.len(), 2);
        assert_eq!(sinks.files.len(), 2);
        assert!(dir.path().join("service.log").exists());
        assert!(dir.path().join("traces.json").exists());
    }

    #[test]
    fn span_layer_only_for_stdout_mode() {
        let sinks = build_sinks(&settings(
            LoggingConfig::default(),
            ObservabilityMode::Stdout,
            false,
        ))
        .unwrap();
        assert_eq!(sinks.layers.len(), 2);

        // OTLP layers are added by the handle, not here.
        let sinks = build_sinks(&settings(
            LoggingConfig::default(),
            ObservabilityMode::Otpl,
            false,
        ))
        .unwrap();
        assert_eq!(sinks.layers.len(), 1);
    }
}
