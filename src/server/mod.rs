//! Runnable servers.
//!
//! # Data Flow
//! ```text
//! Application::init
//!     → Vec<Box<dyn RunnableServer>>
//!     → Service launches run(ctx) per server (one task each)
//!     → on termination: shutdown(ctx) per server, launch order
//! ```
//!
//! # Design Decisions
//! - The supervisor sees only identity + lifecycle, never server internals
//! - `run` returning before `shutdown` is a crash
//! - Concrete wrappers (http.rs, grpc.rs, tcp.rs) share one state machine:
//!   Idle → Starting → Serving → Stopped

pub mod grpc;
pub mod http;
pub mod tcp;

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::lifecycle::Context;

pub use grpc::{GrpcServer, Registrar};
pub use http::HttpServer;
pub use tcp::{ConnectionHandler, TcpServer};

/// A named, independently lifecycled long-running component.
#[async_trait]
pub trait RunnableServer: Send + Sync {
    /// Identity for logging and correlation.
    fn info(&self) -> &ServerInfo;

    /// Serve until stopped or failed. Must return promptly once `ctx` is
    /// cancelled or [`shutdown`](Self::shutdown) is called.
    async fn run(&self, ctx: Context) -> Result<(), BoxError>;

    /// Request a graceful stop by the deadline carried in `ctx`. Called at
    /// most once.
    async fn shutdown(&self, ctx: Context) -> Result<(), BoxError>;
}

/// Identity of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    /// Transport, e.g. "tcp".
    pub network: String,
    /// Bind host; empty means all interfaces.
    pub host: String,
    pub port: u16,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            network: "tcp".to_string(),
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with an empty host meaning all interfaces.
    pub fn address(&self) -> String {
        let host = if self.host.is_empty() { "0.0.0.0" } else { &self.host };
        format!("{}:{}", host, self.port)
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}://{})", self.name, self.network, self.address())
    }
}

/// Errors raised by the bundled server wrappers.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server '{name}' failed to bind {address}: {source}")]
    Bind {
        name: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server '{name}' failed while serving: {source}")]
    Serve {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server '{name}' transport failed: {source}")]
    Transport {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("server '{name}' was already started")]
    AlreadyStarted { name: String },

    #[error("server '{name}' did not drain before the deadline")]
    DrainTimeout { name: String },
}

/// Where a wrapper is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Starting,
    Serving(SocketAddr),
    Stopped,
}

/// Lifecycle bookkeeping shared by the bundled wrappers.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    name: String,
    stop: CancellationToken,
    state: watch::Sender<ServerState>,
}

impl Lifecycle {
    pub(crate) fn new(name: &str) -> Self {
        let (state, _) = watch::channel(ServerState::Idle);
        Self {
            name: name.to_string(),
            stop: CancellationToken::new(),
            state,
        }
    }

    /// Move Idle → Starting. Fails if `run` was already called.
    pub(crate) fn begin(&self) -> Result<(), ServerError> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == ServerState::Idle {
                *state = ServerState::Starting;
                started = true;
            }
            started
        });

        if started {
            Ok(())
        } else {
            Err(ServerError::AlreadyStarted {
                name: self.name.clone(),
            })
        }
    }

    pub(crate) fn serving(&self, addr: SocketAddr) {
        self.state.send_replace(ServerState::Serving(addr));
    }

    pub(crate) fn finished(&self) {
        self.state.send_replace(ServerState::Stopped);
    }

    pub(crate) fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub(crate) fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Resolves with the bound address once serving, or `None` if the server
    /// stopped first.
    pub(crate) async fn wait_serving(&self) -> Option<SocketAddr> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, ServerState::Serving(_) | ServerState::Stopped))
            .await
            .ok()
            .map(|s| *s);
        match state {
            Some(ServerState::Serving(addr)) => Some(addr),
            _ => None,
        }
    }

    /// Signal stop and wait for `run` to wind down, bounded by `ctx`.
    pub(crate) async fn stop(&self, ctx: &Context) -> Result<(), ServerError> {
        self.stop.cancel();

        let mut rx = self.state.subscribe();
        if *rx.borrow() == ServerState::Idle {
            return Ok(());
        }

        tokio::select! {
            _ = rx.wait_for(|s| *s == ServerState::Stopped) => Ok(()),
            _ = ctx.cancelled() => Err(ServerError::DrainTimeout {
                name: self.name.clone(),
            }),
        }
    }
}
