//! The service orchestrator.
//!
//! # Data Flow
//! ```text
//! ServiceBuilder (app + config source + build info)
//!     → bootstrap(): config → BuildInfo → validate → observability → app.init
//!     → Service { app, servers, observability, interrupt }
//!     → run() (supervisor.rs): launch → decide → shut down → Outcome
//! ```
//!
//! # Design Decisions
//! - Bootstrap errors are returned before anything is launched
//! - Observability and the interrupt source are injectable handles
//! - `run` consumes the service: each component runs at most once

mod supervisor;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::application::Application;
use crate::config::{BuildInfo, ServiceConfig, DEFAULT_CONFIG_PATH};
use crate::error::RuntimeError;
use crate::lifecycle::startup::{self, ConfigSource};
use crate::lifecycle::{CtrlC, InterruptSource};
use crate::observability::Observability;
use crate::server::RunnableServer;

/// Collects everything needed to bootstrap a [`Service`].
pub struct ServiceBuilder<A: Application> {
    app: A,
    build_info: BuildInfo,
    config: ConfigSource<A::Config>,
    observability: Option<Arc<dyn Observability>>,
    interrupt: Option<Box<dyn InterruptSource>>,
    shutdown_timeout: Option<Duration>,
}

impl<A: Application> ServiceBuilder<A> {
    pub fn new(app: A) -> Self {
        Self {
            app,
            build_info: BuildInfo::default(),
            config: ConfigSource::Path(PathBuf::from(DEFAULT_CONFIG_PATH)),
            observability: None,
            interrupt: None,
            shutdown_timeout: None,
        }
    }

    pub fn build_info(mut self, build_info: BuildInfo) -> Self {
        self.build_info = build_info;
        self
    }

    /// Load the configuration document from `path` (YAML or TOML).
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = ConfigSource::Path(path.into());
        self
    }

    /// Use an in-memory configuration document instead of a file.
    pub fn config(mut self, config: A::Config) -> Self {
        self.config = ConfigSource::Value(config);
        self
    }

    /// Use `observability` instead of installing the global tracing
    /// subscriber.
    pub fn observability(mut self, observability: Arc<dyn Observability>) -> Self {
        self.observability = Some(observability);
        self
    }

    /// Interrupt source for the decision loop (default: Ctrl+C).
    pub fn interrupt(mut self, interrupt: Box<dyn InterruptSource>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Override `framework.shutdown_timeout_secs`.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Load and validate config, initialize observability and the
    /// application.
    ///
    /// On error nothing has been launched.
    pub async fn bootstrap(self) -> Result<Service<A>, RuntimeError> {
        let Self {
            mut app,
            build_info,
            config,
            observability,
            interrupt,
            shutdown_timeout,
        } = self;

        let config = startup::prepare_config(config, build_info)?;
        let framework = config.framework();

        let observability = match observability {
            Some(observability) => observability,
            None => startup::init_observability(framework)?,
        };

        tracing::info!(
            service = %framework.service_versioned_name(),
            build = %framework.build_info.clone().unwrap_or_default(),
            "Initializing app"
        );

        let servers = app.init(&config).await.map_err(RuntimeError::Init)?;
        let servers: Vec<Arc<dyn RunnableServer>> = servers.into_iter().map(Arc::from).collect();

        for server in &servers {
            tracing::debug!(server = %server.info(), "Server registered");
        }

        let shutdown_timeout =
            shutdown_timeout.unwrap_or_else(|| config.framework().shutdown_timeout());
        let interrupt = interrupt.unwrap_or_else(|| Box::new(CtrlC::new()));

        Ok(Service {
            config,
            app: Arc::new(app),
            servers,
            observability,
            interrupt,
            shutdown_timeout,
        })
    }
}

/// A bootstrapped service, ready to [`run`](Service::run).
pub struct Service<A: Application> {
    config: A::Config,
    app: Arc<A>,
    servers: Vec<Arc<dyn RunnableServer>>,
    observability: Arc<dyn Observability>,
    interrupt: Box<dyn InterruptSource>,
    shutdown_timeout: Duration,
}

impl<A: Application> Service<A> {
    pub fn builder(app: A) -> ServiceBuilder<A> {
        ServiceBuilder::new(app)
    }

    pub fn config(&self) -> &A::Config {
        &self.config
    }

    pub fn observability(&self) -> &Arc<dyn Observability> {
        &self.observability
    }

    /// Servers in launch order.
    pub fn servers(&self) -> &[Arc<dyn RunnableServer>] {
        &self.servers
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}
