//! The Running → ShuttingDown → Terminated state machine.
//!
//! # Data Flow
//! ```text
//! root span + root context
//!     → one task per server, one for the application (JoinSet)
//!     → decision loop: select { interrupt, first completion }
//!     → Outcome decided once
//!     → ShutdownSequence (servers in launch order, then application)
//!     → root span closed → observability closed → contexts cancelled
//! ```
//!
//! # Design Decisions
//! - Each component runs on its own task, wrapped by a supervising task so a
//!   panic is attributed to the component that raised it
//! - Tasks are cancelled through their contexts, never aborted; stragglers
//!   are detached at the end
//! - `Ok` from the application while servers exist keeps the loop running
//! - Component tasks run under their own spans that follow from the root
//!   span, so a detached straggler cannot keep the root span open

use std::fmt;
use std::future::Future;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::application::Application;
use crate::config::ServiceConfig;
use crate::error::{is_graceful, BoxError, RuntimeError};
use crate::lifecycle::{Context, Outcome, ShutdownSequence};
use crate::observability::metrics;
use crate::service::Service;

/// A supervised component.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Server(String),
    Application,
}

impl Component {
    fn kind(&self) -> &'static str {
        match self {
            Component::Server(_) => "server",
            Component::Application => "application",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Server(name) => write!(f, "server '{}'", name),
            Component::Application => write!(f, "application"),
        }
    }
}

/// How a component's task ended.
#[derive(Debug)]
enum Exit {
    Returned(Result<(), BoxError>),
    Panicked,
    Cancelled,
}

impl Exit {
    fn label(&self) -> &'static str {
        match self {
            Exit::Returned(Ok(())) => "ok",
            Exit::Returned(Err(_)) => "error",
            Exit::Panicked => "panic",
            Exit::Cancelled => "cancelled",
        }
    }
}

/// Span for one component's task, linked to (not nested in) the root span.
fn component_span(component: &Component, root: &tracing::Span) -> tracing::Span {
    let span = tracing::info_span!(parent: None, "component", component = %component);
    span.follows_from(root);
    span
}

/// Run `component` on its own task and report how it ended.
async fn supervise<F>(component: Component, run: F) -> (Component, Exit)
where
    F: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let exit = match tokio::spawn(run).await {
        Ok(result) => Exit::Returned(result),
        Err(e) if e.is_panic() => Exit::Panicked,
        Err(_) => Exit::Cancelled,
    };
    (component, exit)
}

/// Map a component exit to the service outcome, or `None` to keep running.
fn decide(component: Component, exit: Exit, server_count: usize) -> Option<Outcome> {
    match (component, exit) {
        (component, Exit::Returned(Err(e))) if is_graceful(&*e) => {
            tracing::info!(component = %component, "Graceful shutdown requested");
            Some(Outcome::completed())
        }
        (Component::Application, Exit::Returned(Ok(()))) => {
            if server_count == 0 {
                tracing::info!("Application finished");
                Some(Outcome::completed())
            } else {
                tracing::info!(servers = server_count, "Application finished, servers continue");
                None
            }
        }
        (Component::Application, Exit::Returned(Err(e))) => {
            Some(Outcome::crashed(RuntimeError::Application(e)))
        }
        (Component::Server(name), Exit::Returned(Ok(()))) => {
            Some(Outcome::crashed(RuntimeError::ServerStopped { name }))
        }
        (Component::Server(name), Exit::Returned(Err(source))) => {
            Some(Outcome::crashed(RuntimeError::Server { name, source }))
        }
        (component, Exit::Panicked) => Some(Outcome::crashed(RuntimeError::Panicked {
            component: component.to_string(),
        })),
        (component, Exit::Cancelled) => {
            tracing::warn!(component = %component, "Component task cancelled");
            None
        }
    }
}

impl<A: Application> Service<A> {
    /// Run until interrupted, stopped gracefully or crashed, then shut
    /// everything down within the shutdown timeout.
    ///
    /// Never exits the process; map the returned [`Outcome`] to an exit code.
    pub async fn run(self) -> Outcome {
        let Service {
            config,
            app,
            servers,
            observability,
            mut interrupt,
            shutdown_timeout,
        } = self;

        let service_name = config.framework().service_versioned_name();
        let mut root_span = observability.root_span();
        let span = root_span.span();
        let root = Context::new();

        let mut tasks = JoinSet::new();
        for server in &servers {
            let component = Component::Server(server.info().name.clone());
            tracing::info!(parent: &span, server = %server.info(), "Starting server");
            metrics::record_component_started(component.kind());

            let server = server.clone();
            let ctx = root.child();
            let run = async move { server.run(ctx).await }
                .instrument(component_span(&component, &span));
            tasks.spawn(supervise(component, run));
        }

        {
            let app = app.clone();
            let ctx = root.child();
            let run = async move { app.run(ctx).await }
                .instrument(component_span(&Component::Application, &span));
            metrics::record_component_started(Component::Application.kind());
            tasks.spawn(supervise(Component::Application, run));
        }

        tracing::info!(parent: &span, service = %service_name, servers = servers.len(), "Service running");

        let outcome = async {
            loop {
                tokio::select! {
                    _ = interrupt.recv() => {
                        tracing::warn!("Starting soft shutdown");
                        break Outcome::interrupted();
                    }
                    Some(joined) = tasks.join_next() => {
                        let (component, exit) = match joined {
                            Ok(done) => done,
                            Err(e) => {
                                tracing::warn!(error = %e, "Supervising task failed");
                                continue;
                            }
                        };
                        metrics::record_component_exit(component.kind(), exit.label());
                        if let Some(outcome) = decide(component, exit, servers.len()) {
                            break outcome;
                        }
                    }
                }
            }
        }
        .instrument(span.clone())
        .await;

        let triggered_at = Instant::now();
        match outcome.error() {
            Some(err) => tracing::error!(parent: &span, fatal = true, error = %err, "Service crashed"),
            None => tracing::info!(
                parent: &span,
                trigger = outcome.trigger().as_str(),
                "Shutdown triggered"
            ),
        }

        let mut sequence = ShutdownSequence::new(root.with_timeout(shutdown_timeout));
        async {
            for server in &servers {
                let ctx = sequence.context();
                sequence
                    .step("server", &server.info().name, server.shutdown(ctx))
                    .await;
            }
            let ctx = sequence.context();
            sequence
                .step("application", "application", app.shutdown(ctx))
                .await;
        }
        .instrument(span.clone())
        .await;

        if let Some(err) = outcome.error() {
            root_span.record_error(err);
        }
        root_span.end();
        drop(span);

        tracing::info!("Shutting down observability");
        if let Err(e) = observability.close(&sequence.context()).await {
            tracing::error!(error = %e, "Failed to close observability");
        }

        let report = sequence.finish();
        root.cancel();
        tasks.detach_all();

        let elapsed = triggered_at.elapsed();
        metrics::record_shutdown(outcome.trigger().as_str(), elapsed);
        tracing::info!(
            trigger = outcome.trigger().as_str(),
            exit_code = outcome.exit_code(),
            shutdown_failures = report.failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Exiting"
        );

        outcome
    }
}
