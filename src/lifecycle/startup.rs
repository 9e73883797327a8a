//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the application's configuration document (or accept one in memory)
//! - Inject build metadata into the framework sub-record
//! - Validate the framework sub-record
//! - Initialize the observability sinks from the validated config
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is launched
//! - Steps run in order, never concurrently
//! - Observability comes after validation so its settings are known-good

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::{
    debug_stdout_from_env, load_config, validate_framework, BuildInfo, ConfigError,
    FrameworkConfig, ServiceConfig,
};
use crate::observability::{
    Observability, ObservabilityError, ObservabilitySettings, TracingObservability,
};

/// Where the configuration document comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource<C> {
    /// Read and parse a YAML or TOML file.
    Path(PathBuf),
    /// Use an already-built document.
    Value(C),
}

/// Resolve, stamp and validate the configuration document.
pub fn prepare_config<C>(source: ConfigSource<C>, build_info: BuildInfo) -> Result<C, ConfigError>
where
    C: ServiceConfig + DeserializeOwned,
{
    let mut config = match source {
        ConfigSource::Path(path) => {
            tracing::debug!(path = %path.display(), "Loading config");
            load_config::<C>(&path)?
        }
        ConfigSource::Value(config) => config,
    };

    config.framework_mut().build_info = Some(build_info);
    validate_framework(config.framework()).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Install the tracing subscriber (and metrics exporter) for `framework`.
///
/// Reads the `DEBUG` environment variable.
pub fn init_observability(
    framework: &FrameworkConfig,
) -> Result<Arc<dyn Observability>, ObservabilityError> {
    let settings = ObservabilitySettings::from_framework(framework, debug_stdout_from_env());
    let observability = TracingObservability::init(&settings)?;
    tracing::info!(
        service = %framework.service_versioned_name(),
        instance_id = %observability.instance_id(),
        "Observability ready"
    );
    Ok(Arc::new(observability))
}
