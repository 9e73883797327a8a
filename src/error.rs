//! Error types shared by the supervisor and its collaborators.
//!
//! # Taxonomy
//! ```text
//! Bootstrap  → Config / Observability / Init      (returned before Running)
//! Runtime    → Server / ServerStopped / Application / Panicked   (exit code 1)
//! Shutdown   → logged by the shutdown sequence, never surfaced
//! Sentinel   → GracefulShutdown anywhere in a source chain       (exit code 0)
//! ```

use std::error::Error as StdError;

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::ObservabilityError;

/// Boxed error returned by collaborator implementations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Sentinel an application (or server) returns from `run` to request a clean
/// stop that does not count as a crash.
#[derive(Debug, Error, Clone, Copy, Default, PartialEq, Eq)]
#[error("graceful shutdown")]
pub struct GracefulShutdown;

impl GracefulShutdown {
    /// The sentinel, boxed for returning from `run`.
    pub fn boxed() -> BoxError {
        Box::new(Self)
    }
}

/// Whether `err`, or any error in its `source()` chain, is [`GracefulShutdown`].
pub fn is_graceful(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<GracefulShutdown>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Errors produced by the service runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded or validated.
    #[error("couldn't start without config: {0}")]
    Config(#[from] ConfigError),

    /// Observability sinks could not be initialized.
    #[error("couldn't set observability config: {0}")]
    Observability(#[from] ObservabilityError),

    /// `Application::init` failed.
    #[error("couldn't initialize app: {0}")]
    Init(#[source] BoxError),

    /// A server's `run` returned an error.
    #[error("server '{name}' crashed: {source}")]
    Server {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A server's `run` returned before shutdown was requested.
    #[error("server '{name}' stopped unexpectedly")]
    ServerStopped { name: String },

    /// The application's `run` returned an error.
    #[error("application crashed: {0}")]
    Application(#[source] BoxError),

    /// A supervised task panicked.
    #[error("{component} panicked")]
    Panicked { component: String },
}
