//! Raw TCP server wrapper.
//!
//! # Responsibilities
//! - Accept connections through the bounded [`Listener`]
//! - Hand each connection to a caller-supplied handler on its own task
//! - On stop: close the listener, cancel handler contexts, wait for the drain

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::BoxError;
use crate::lifecycle::Context;
use crate::net::{Accepted, ConnectionTracker, Listener, ListenerError};
use crate::server::{Lifecycle, RunnableServer, ServerError, ServerInfo, ServerState};

/// Handles one accepted connection. The context is cancelled when the server
/// starts shutting down.
pub type ConnectionHandler = Arc<
    dyn Fn(TcpStream, SocketAddr, Context) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Delay after a failed accept, so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// TCP server with a connection limit.
pub struct TcpServer {
    info: ServerInfo,
    max_connections: usize,
    handler: ConnectionHandler,
    tracker: ConnectionTracker,
    lifecycle: Lifecycle,
}

impl TcpServer {
    pub fn new<F, Fut>(info: ServerInfo, max_connections: usize, handler: F) -> Self
    where
        F: Fn(TcpStream, SocketAddr, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let lifecycle = Lifecycle::new(&info.name);
        let handler: ConnectionHandler = Arc::new(
            move |stream: TcpStream,
                  peer: SocketAddr,
                  ctx: Context|
                  -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(handler(stream, peer, ctx))
            },
        );
        Self {
            info,
            max_connections,
            handler,
            tracker: ConnectionTracker::new(),
            lifecycle,
        }
    }

    /// Bound address once serving; `None` if the server stopped first.
    pub async fn wait_serving(&self) -> Option<SocketAddr> {
        self.lifecycle.wait_serving().await
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Connections currently being handled.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}

#[async_trait]
impl RunnableServer for TcpServer {
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

        let listener = match Listener::bind(&self.info.address(), self.max_connections).await {
            Ok(listener) => listener,
            Err(e) => {
                self.lifecycle.finished();
                let (address, source) = match e {
                    ListenerError::Bind { address, source } => (address, source),
                    other => (self.info.address(), std::io::Error::other(other)),
                };
                return Err(ServerError::Bind {
                    name: self.info.name.clone(),
                    address,
                    source,
                }
                .into());
            }
        };
        let local_addr = listener.local_addr();
        self.lifecycle.serving(local_addr);

        tracing::info!(
            server = %self.info.name,
            address = %local_addr,
            max_connections = self.max_connections,
            "Listening server"
        );

        let connections = ctx.child();
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ctx.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(Accepted { stream, peer, permit }) => {
                        let guard = self.tracker.track();
                        let handler = Arc::clone(&self.handler);
                        let conn_ctx = connections.child();
                        tokio::spawn(async move {
                            tracing::trace!(connection_id = %guard.id(), peer_addr = %peer, "Connection opened");
                            handler(stream, peer, conn_ctx).await;
                            drop(permit);
                            drop(guard);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(server = %self.info.name, error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        listener.close();
        drop(listener);
        connections.cancel();
        tracing::debug!(
            server = %self.info.name,
            active = self.tracker.active_count(),
            "Draining connections"
        );
        self.tracker.drained().await;

        self.lifecycle.finished();
        tracing::info!(server = %self.info.name, "TCP server stopped");
        Ok(())
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError> {
        tracing::debug!(server = %self.info.name, "Shutting down TCP server");
        self.lifecycle.stop(&ctx).await?;
        Ok(())
    }
}
