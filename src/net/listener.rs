//! Bounded TCP listener.
//!
//! # Responsibilities
//! - Bind a server's address
//! - Hold back `accept` while `max_connections` connections are live
//! - Stop handing out connection slots once closed

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Listener closed")]
    Closed,
}

/// A connection handed out by [`Listener::accept`].
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Keep alive for as long as the connection is served.
    pub permit: ConnectionPermit,
}

/// TCP listener admitting at most `max_connections` live connections.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    pub async fn bind(address: &str, max_connections: usize) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: address.to_string(),
            source,
        };

        let inner = TcpListener::bind(address).await.map_err(bind_error)?;
        let local_addr = inner.local_addr().map_err(bind_error)?;

        tracing::debug!(address = %local_addr, max_connections, "Listener bound");

        Ok(Self {
            inner,
            local_addr,
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Wait for a free slot, then for the next connection.
    ///
    /// Cancel-safe: a slot taken by a cancelled call is released.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %peer,
            free_slots = self.slots.available_permits(),
            "Connection accepted"
        );

        Ok(Accepted {
            stream,
            peer,
            permit: ConnectionPermit { _permit: permit },
        })
    }

    /// Refuse further accepts. Connections already handed out keep their
    /// slots.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Slots not held by a live connection.
    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One connection slot, released on drop (also when the handler panics).
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
