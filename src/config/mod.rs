//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML, default `config.yaml`)
//!     → loader.rs (read & deserialize into the application's document)
//!     → BuildInfo injected into the framework sub-record
//!     → validation.rs (semantic checks on the framework sub-record)
//!     → handed to Application::init, immutable afterwards
//! ```
//!
//! # Design Decisions
//! - The application owns the document type; the runtime only needs the
//!   `framework` sub-record, reached through [`ServiceConfig`]
//! - All framework fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

use std::path::PathBuf;

use clap::Parser;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BuildInfo, FrameworkConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ObservabilityMode,
    ServiceConfig,
};
pub use validation::{validate_framework, ValidationError};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable forcing verbose stdout logging.
pub const DEBUG_STDOUT_ENV: &str = "DEBUG";

/// Process arguments recognized by the runtime.
#[derive(Debug, Clone, Parser)]
#[command(about = "Runs a supervised service", long_about = None)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

/// Whether [`DEBUG_STDOUT_ENV`] asks for verbose stdout logging.
pub fn debug_stdout_from_env() -> bool {
    std::env::var(DEBUG_STDOUT_ENV)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
