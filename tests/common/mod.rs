//! Shared fakes for the supervisor and server integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use runwright::lifecycle::{manual, InterruptHandle};
use runwright::observability::{Observability, ObservabilityError, RootSpan};
use runwright::{
    Application, BoxError, Context, FrameworkConfig, GracefulShutdown, RunnableServer, ServerInfo,
    Service, ServiceBuilder, ServiceConfig,
};
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::span;
use tracing::Subscriber;
use tracing_subscriber::layer::{self, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Ordered log of everything the fakes observed.
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
    deadlines: Mutex<Vec<(String, Option<Instant>)>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn record_deadline(&self, component: &str, deadline: Option<Instant>) {
        self.deadlines
            .lock()
            .unwrap()
            .push((component.to_string(), deadline));
    }

    pub fn deadlines(&self) -> Vec<(String, Option<Instant>)> {
        self.deadlines.lock().unwrap().clone()
    }
}

/// What a fake component does in `run`.
#[derive(Debug, Clone, Copy)]
pub enum RunBehavior {
    /// Block until its own shutdown is called.
    UntilShutdown,
    /// Return an error after the delay.
    FailAfter(Duration),
    /// Return `Ok(())` immediately.
    ReturnOk,
    /// Return the graceful sentinel immediately.
    Graceful,
    Panic,
    /// Never return, ignoring both context and shutdown.
    Forever,
}

/// What a fake component does in `shutdown`.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownBehavior {
    Ok,
    Fail,
    Hang,
}

async fn run_as(
    name: &str,
    behavior: RunBehavior,
    stop: &CancellationToken,
) -> Result<(), BoxError> {
    match behavior {
        RunBehavior::UntilShutdown => {
            stop.cancelled().await;
            Ok(())
        }
        RunBehavior::FailAfter(delay) => {
            tokio::time::sleep(delay).await;
            Err(format!("{} failed", name).into())
        }
        RunBehavior::ReturnOk => Ok(()),
        RunBehavior::Graceful => Err(GracefulShutdown::boxed()),
        RunBehavior::Panic => panic!("{} panicked", name),
        RunBehavior::Forever => {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

async fn shutdown_as(
    name: &str,
    behavior: ShutdownBehavior,
    stop: &CancellationToken,
) -> Result<(), BoxError> {
    match behavior {
        ShutdownBehavior::Ok => {
            stop.cancel();
            Ok(())
        }
        ShutdownBehavior::Fail => {
            stop.cancel();
            Err(format!("{} refused to stop", name).into())
        }
        ShutdownBehavior::Hang => {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

/// Server recording its calls into a [`Journal`].
pub struct FakeServer {
    info: ServerInfo,
    journal: Arc<Journal>,
    run: RunBehavior,
    shutdown: ShutdownBehavior,
    stop: CancellationToken,
}

impl FakeServer {
    pub fn new(name: &str, journal: &Arc<Journal>) -> Self {
        Self {
            info: ServerInfo::new(name, "127.0.0.1", 0),
            journal: Arc::clone(journal),
            run: RunBehavior::UntilShutdown,
            shutdown: ShutdownBehavior::Ok,
            stop: CancellationToken::new(),
        }
    }

    pub fn run(mut self, behavior: RunBehavior) -> Self {
        self.run = behavior;
        self
    }

    pub fn shutdown(mut self, behavior: ShutdownBehavior) -> Self {
        self.shutdown = behavior;
        self
    }
}

#[async_trait]
impl RunnableServer for FakeServer {
    fn info(&self) -> &ServerInfo {
        &self.info
    }

    async fn run(&self, _ctx: Context) -> Result<(), BoxError> {
        self.journal.push(format!("{}.run", self.info.name));
        run_as(&self.info.name, self.run, &self.stop).await
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError> {
        self.journal.push(format!("{}.shutdown", self.info.name));
        self.journal.record_deadline(&self.info.name, ctx.deadline());
        shutdown_as(&self.info.name, self.shutdown, &self.stop).await
    }
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub framework: FrameworkConfig,
}

impl TestConfig {
    pub fn named(service_name: &str) -> Self {
        Self {
            framework: FrameworkConfig {
                service_name: service_name.to_string(),
                ..Default::default()
            },
        }
    }
}

impl ServiceConfig for TestConfig {
    fn framework(&self) -> &FrameworkConfig {
        &self.framework
    }

    fn framework_mut(&mut self) -> &mut FrameworkConfig {
        &mut self.framework
    }
}

/// Application handing out pre-built servers from `init`.
pub struct FakeApp {
    journal: Arc<Journal>,
    servers: Vec<Box<dyn RunnableServer>>,
    run: RunBehavior,
    shutdown: ShutdownBehavior,
    fail_init: bool,
    stop: CancellationToken,
}

impl FakeApp {
    pub fn new(journal: &Arc<Journal>) -> Self {
        Self {
            journal: Arc::clone(journal),
            servers: Vec::new(),
            run: RunBehavior::UntilShutdown,
            shutdown: ShutdownBehavior::Ok,
            fail_init: false,
            stop: CancellationToken::new(),
        }
    }

    pub fn server(mut self, server: impl RunnableServer + 'static) -> Self {
        self.servers.push(Box::new(server));
        self
    }

    pub fn run(mut self, behavior: RunBehavior) -> Self {
        self.run = behavior;
        self
    }

    pub fn shutdown(mut self, behavior: ShutdownBehavior) -> Self {
        self.shutdown = behavior;
        self
    }

    pub fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

#[async_trait]
impl Application for FakeApp {
    type Config = TestConfig;

    async fn init(&mut self, _config: &TestConfig) -> Result<Vec<Box<dyn RunnableServer>>, BoxError> {
        self.journal.push("app.init");
        if self.fail_init {
            return Err("database unreachable".into());
        }
        Ok(std::mem::take(&mut self.servers))
    }

    async fn run(&self, _ctx: Context) -> Result<(), BoxError> {
        self.journal.push("app.run");
        run_as("app", self.run, &self.stop).await
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError> {
        self.journal.push("app.shutdown");
        self.journal.record_deadline("app", ctx.deadline());
        shutdown_as("app", self.shutdown, &self.stop).await
    }
}

/// Observability handle that only records calls.
pub struct FakeObservability {
    journal: Arc<Journal>,
    traced: bool,
}

impl FakeObservability {
    pub fn new(journal: &Arc<Journal>) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            traced: false,
        })
    }

    /// Like [`FakeObservability::new`], but the root span is a real
    /// `tracing` span named "run".
    pub fn traced(journal: &Arc<Journal>) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            traced: true,
        })
    }
}

#[async_trait]
impl Observability for FakeObservability {
    fn root_span(&self) -> Box<dyn RootSpan> {
        self.journal.push("span.open");
        let span = if self.traced {
            tracing::info_span!("run")
        } else {
            tracing::Span::none()
        };
        Box::new(FakeSpan {
            journal: Arc::clone(&self.journal),
            span,
        })
    }

    async fn close(&self, _ctx: &Context) -> Result<(), ObservabilityError> {
        self.journal.push("obs.close");
        Ok(())
    }
}

struct FakeSpan {
    journal: Arc<Journal>,
    span: tracing::Span,
}

impl RootSpan for FakeSpan {
    fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    fn record_error(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.journal.push(format!("span.error: {}", error));
    }

    fn end(self: Box<Self>) {
        self.journal.push("span.end");
    }
}

/// Layer journaling `<name>.closed` whenever a span fully closes.
pub struct SpanCloseRecorder {
    journal: Arc<Journal>,
}

impl SpanCloseRecorder {
    pub fn new(journal: &Arc<Journal>) -> Self {
        Self {
            journal: Arc::clone(journal),
        }
    }
}

impl<S> Layer<S> for SpanCloseRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_close(&self, id: span::Id, ctx: layer::Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            self.journal.push(format!("{}.closed", span.name()));
        }
    }
}

/// Builder wired with an in-memory config, the fake observability handle and
/// a manual interrupt.
pub fn builder(app: FakeApp, journal: &Arc<Journal>) -> (ServiceBuilder<FakeApp>, InterruptHandle) {
    let (handle, interrupt) = manual();
    let builder = Service::builder(app)
        .config(TestConfig::named("test-svc"))
        .observability(FakeObservability::new(journal))
        .interrupt(Box::new(interrupt))
        .shutdown_timeout(Duration::from_secs(2));
    (builder, handle)
}

/// Fire `handle` after `delay`.
pub fn interrupt_after(handle: InterruptHandle, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        handle.trigger();
    });
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
