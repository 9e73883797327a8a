//! gRPC server wrapper.
//!
//! # Responsibilities
//! - Collect tonic services from caller-supplied registrars
//! - Wire up middleware (per-call tracing span, panic recovery, call timeout)
//! - Register the standard `grpc.health.v1.Health` service
//! - Serve until stop or context cancellation, then drain in-flight calls
//!
//! # Design Decisions
//! - Registrars run at `run` time, once, against a fresh `RoutesBuilder`
//! - Health reports NOT_SERVING as soon as shutdown begins, so balancers
//!   stop routing before the listener closes
//! - Call spans come from `TraceLayer::new_for_grpc`; in `otpl` mode they are
//!   exported like any other span

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::error::BoxError;
use crate::lifecycle::Context;
use crate::server::{Lifecycle, RunnableServer, ServerError, ServerInfo, ServerState};

/// Adds services to the server's routes.
pub type Registrar = Box<dyn Fn(&mut RoutesBuilder) + Send + Sync>;

/// gRPC server around a set of tonic services.
pub struct GrpcServer {
    info: ServerInfo,
    registrars: Vec<Registrar>,
    request_timeout: Duration,
    health: HealthReporter,
    lifecycle: Lifecycle,
}

impl GrpcServer {
    /// Create a server that will serve on `info.address()`.
    pub fn new(info: ServerInfo) -> Self {
        let (health, health_service) = tonic_health::server::health_reporter();
        let register_health: Registrar = Box::new(move |routes: &mut RoutesBuilder| {
            routes.add_service(health_service.clone());
        });
        let lifecycle = Lifecycle::new(&info.name);
        Self {
            info,
            registrars: vec![register_health],
            request_timeout: Duration::from_secs(30),
            health,
            lifecycle,
        }
    }

    /// Add a registrar, e.g.
    /// `|routes| { routes.add_service(GreeterServer::new(greeter)); }`.
    pub fn register<F>(mut self, registrar: F) -> Self
    where
        F: Fn(&mut RoutesBuilder) + Send + Sync + 'static,
    {
        self.registrars.push(Box::new(registrar));
        self
    }

    /// Per-call timeout (default 30s). Calls past it fail with
    /// `DEADLINE_EXCEEDED`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reporter for the bundled health service, to mark individual services
    /// serving or not.
    pub fn health_reporter(&self) -> HealthReporter {
        self.health.clone()
    }

    /// Bound address once serving; `None` if the server stopped first.
    pub async fn wait_serving(&self) -> Option<SocketAddr> {
        self.lifecycle.wait_serving().await
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    fn routes(&self) -> RoutesBuilder {
        let mut routes = RoutesBuilder::default();
        for registrar in &self.registrars {
            tracing::debug!(server = %self.info.name, "Registering gRPC service");
            registrar(&mut routes);
        }
        routes
    }
}

#[async_trait]
impl RunnableServer for GrpcServer {
    fn info(&self) -> &ServerInfo {
        &self.info
    }

    async fn run(&self, ctx: Context) -> Result<(), BoxError> {
        self.lifecycle.begin()?;

        let stop = self.lifecycle.stop_token();
        if stop.is_cancelled() {
            self.lifecycle.finished();
            return Ok(());
        }

        let address = self.info.address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.lifecycle.finished();
                return Err(ServerError::Bind {
                    name: self.info.name.clone(),
                    address,
                    source,
                }
                .into());
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.lifecycle.finished();
                return Err(ServerError::Serve {
                    name: self.info.name.clone(),
                    source,
                }
                .into());
            }
        };

        let routes = self.routes().routes();
        let mut server = Server::builder().timeout(self.request_timeout).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_grpc())
                .layer(CatchPanicLayer::new())
                .into_inner(),
        );

        self.lifecycle.serving(local_addr);
        tracing::info!(
            server = %self.info.name,
            address = %local_addr,
            "Starting gRPC server"
        );

        let result = server
            .add_routes(routes)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    _ = ctx.cancelled() => {}
                }
            })
            .await;

        self.lifecycle.finished();
        tracing::info!(server = %self.info.name, "gRPC server stopped");

        result.map_err(|source| {
            ServerError::Transport {
                name: self.info.name.clone(),
                source: Box::new(source),
            }
            .into()
        })
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError> {
        tracing::debug!(server = %self.info.name, "Shutting down gRPC server");
        self.health
            .set_service_status("", ServingStatus::NotServing)
            .await;
        self.lifecycle.stop(&ctx).await?;
        Ok(())
    }
}
