//! Configuration schema definitions.
//!
//! This module defines the framework sub-record every service document
//! carries under its `framework` key. All types derive Serde traits for
//! deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Accessor for the framework sub-record of an application's config document.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct MyConfig {
///     framework: FrameworkConfig,
///     listen_port: u16,
/// }
///
/// impl ServiceConfig for MyConfig {
///     fn framework(&self) -> &FrameworkConfig { &self.framework }
///     fn framework_mut(&mut self) -> &mut FrameworkConfig { &mut self.framework }
/// }
/// ```
pub trait ServiceConfig: Send + Sync + 'static {
    /// The framework sub-record.
    fn framework(&self) -> &FrameworkConfig;

    /// Mutable access, used once during bootstrap to inject [`BuildInfo`].
    fn framework_mut(&mut self) -> &mut FrameworkConfig;
}

/// Framework settings shared by every service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Identifier of the service.
    pub service_name: String,

    /// Log sink settings.
    pub logging: LoggingConfig,

    /// Where trace spans go.
    pub observability_mode: ObservabilityMode,

    /// OTLP/gRPC collector (e.g. "http://otel-collector:4317") for `otpl`
    /// mode. Falls back to `OTEL_EXPORTER_OTLP_ENDPOINT`.
    pub otlp_endpoint: Option<String>,

    /// Prometheus scrape endpoint (e.g. "0.0.0.0:9090"). Disabled when unset.
    pub metrics_address: Option<String>,

    /// Upper bound for the coordinated shutdown, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Build metadata, injected at bootstrap rather than read from the file.
    #[serde(skip)]
    pub build_info: Option<BuildInfo>,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            logging: LoggingConfig::default(),
            observability_mode: ObservabilityMode::default(),
            otlp_endpoint: None,
            metrics_address: None,
            shutdown_timeout_secs: 10,
            build_info: None,
        }
    }
}

impl FrameworkConfig {
    /// Service name suffixed with the build version when known, useful to
    /// group equal running services.
    pub fn service_versioned_name(&self) -> String {
        match &self.build_info {
            Some(build) => format!("{}-{}", self.service_name, build.version),
            None => self.service_name.clone(),
        }
    }

    /// Build version, or "unknown" before injection.
    pub fn service_version(&self) -> &str {
        self.build_info
            .as_ref()
            .map(|b| b.version.as_str())
            .unwrap_or("unknown")
    }

    /// Shutdown deadline as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Log sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level for all channels.
    pub level: LogLevel,

    /// Line format.
    pub format: LogFormat,

    /// Destination.
    pub output: LogOutput,

    /// Target file when `output` is `file`.
    pub file_path: String,

    /// Per-channel level overrides. A channel is a tracing target prefix,
    /// e.g. `runwright::service: debug`.
    pub filtered_channels: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Stdout,
            file_path: "logs.txt".to_string(),
            filtered_channels: BTreeMap::new(),
        }
    }
}

/// Log severity threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Trace span sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservabilityMode {
    /// Spans, log events and metrics exported to an OTLP/gRPC collector.
    Otpl,
    /// Span records as JSON lines in `traces.json`.
    File,
    /// Span records as JSON lines on stdout.
    Stdout,
    /// No span records.
    #[default]
    Disabled,
}

/// Build metadata, attached to the config for correlation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
}

impl BuildInfo {
    pub fn new(
        version: impl Into<String>,
        commit: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            commit: commit.into(),
            date: date.into(),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new("dev", "none", "unknown")
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.version, self.commit, self.date)
    }
}

/// Build metadata of the calling crate.
///
/// Version comes from `CARGO_PKG_VERSION`; commit and date from the optional
/// `RUNWRIGHT_BUILD_COMMIT` and `RUNWRIGHT_BUILD_DATE` compile-time variables.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::config::BuildInfo::new(
            env!("CARGO_PKG_VERSION"),
            option_env!("RUNWRIGHT_BUILD_COMMIT").unwrap_or("none"),
            option_env!("RUNWRIGHT_BUILD_DATE").unwrap_or("unknown"),
        )
    };
}
