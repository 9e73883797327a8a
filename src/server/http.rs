//! HTTP server wrapper.
//!
//! # Responsibilities
//! - Wrap a caller-supplied Axum `Router` as a [`RunnableServer`]
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve with graceful shutdown on stop or context cancellation
//! - Bound the drain by the shutdown deadline

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::error::BoxError;
use crate::lifecycle::Context;
use crate::server::{Lifecycle, RunnableServer, ServerError, ServerInfo, ServerState};

/// HTTP server around an Axum router.
pub struct HttpServer {
    info: ServerInfo,
    router: Router,
    request_timeout: Duration,
    lifecycle: Lifecycle,
}

impl HttpServer {
    /// Create a server that will serve `router` on `info.address()`.
    pub fn new(info: ServerInfo, router: Router) -> Self {
        let lifecycle = Lifecycle::new(&info.name);
        Self {
            info,
            router,
            request_timeout: Duration::from_secs(30),
            lifecycle,
        }
    }

    /// Per-request timeout (default 30s).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Bound address once serving; `None` if the server stopped first.
    pub async fn wait_serving(&self) -> Option<SocketAddr> {
        self.lifecycle.wait_serving().await
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Build the Axum router with all middleware layers. Requests running
    /// past the timeout are answered with 408.
    fn build_app(&self) -> Router {
        self.router.clone().layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    self.request_timeout,
                )),
        )
    }
}

#[async_trait]
impl RunnableServer for HttpServer {
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
        self.lifecycle.serving(local_addr);

        tracing::info!(
            server = %self.info.name,
            address = %local_addr,
            "Listening server"
        );

        let result = axum::serve(listener, self.build_app())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    _ = ctx.cancelled() => {}
                }
            })
            .await;

        self.lifecycle.finished();
        tracing::info!(server = %self.info.name, "HTTP server stopped");

        result.map_err(|source| {
            ServerError::Serve {
                name: self.info.name.clone(),
                source,
            }
            .into()
        })
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError> {
        tracing::debug!(server = %self.info.name, "Shutting down HTTP server");
        self.lifecycle.stop(&ctx).await?;
        Ok(())
    }
}
