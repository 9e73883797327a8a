//! OS signal handling.
//!
//! # Responsibilities
//! - Translate the OS interrupt (Ctrl+C / SIGINT) into an event the
//!   decision loop can select on
//! - Provide a manually triggered source for tests and embedders
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Interrupt only: other signals keep their default disposition
//! - `recv` is cancel-safe so it can sit in a `select!` loop
//! - On unix one signal stream is kept for the source's lifetime, so an
//!   interrupt arriving between two `recv` calls is still delivered

use async_trait::async_trait;
use tokio::sync::watch;

/// A source of operator interrupts.
#[async_trait]
pub trait InterruptSource: Send {
    /// Completes when an interrupt arrives. Must be cancel-safe.
    async fn recv(&mut self);
}

/// Interrupts delivered by the OS (Ctrl+C / SIGINT).
///
/// The handler is installed on the first `recv`.
#[derive(Debug, Default)]
pub struct CtrlC {
    #[cfg(unix)]
    stream: Option<tokio::signal::unix::Signal>,
}

impl CtrlC {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(unix)]
    async fn wait(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => signal(SignalKind::interrupt())?,
        };
        if self.stream.insert(stream).recv().await.is_none() {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn wait(&mut self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await
    }
}

#[async_trait]
impl InterruptSource for CtrlC {
    async fn recv(&mut self) {
        if let Err(e) = self.wait().await {
            tracing::error!(error = %e, "Failed to install interrupt handler, interrupts disabled");
            std::future::pending::<()>().await;
        }
        tracing::info!("Interrupt signal received");
    }
}

/// Interrupt source fired through an [`InterruptHandle`].
#[derive(Debug)]
pub struct ManualInterrupt {
    rx: watch::Receiver<bool>,
}

/// Fires the paired [`ManualInterrupt`].
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

impl InterruptHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Create a manually triggered interrupt source.
///
/// Dropping every handle without triggering means the source never fires.
pub fn manual() -> (InterruptHandle, ManualInterrupt) {
    let (tx, rx) = watch::channel(false);
    (InterruptHandle { tx }, ManualInterrupt { rx })
}

#[async_trait]
impl InterruptSource for ManualInterrupt {
    async fn recv(&mut self) {
        if self.rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn manual_fires_after_trigger() {
        let (handle, mut source) = manual();
        handle.trigger();
        tokio::time::timeout(Duration::from_secs(1), source.recv())
            .await
            .expect("interrupt should fire");
    }

    #[tokio::test]
    async fn manual_pending_without_trigger() {
        let (_handle, mut source) = manual();
        let fired = tokio::time::timeout(Duration::from_millis(50), source.recv()).await;
        assert!(fired.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_between_polls_is_delivered() {
        let mut source = CtrlC::new();
        let idle = tokio::time::timeout(Duration::from_millis(20), source.recv()).await;
        assert!(idle.is_err());

        // Nobody is waiting on the source when the signal lands.
        let status = std::process::Command::new("kill")
            .arg("-INT")
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), source.recv())
            .await
            .expect("buffered interrupt should fire");
    }

    #[tokio::test]
    async fn dropped_handle_never_fires() {
        let (handle, mut source) = manual();
        drop(handle);
        let fired = tokio::time::timeout(Duration::from_millis(50), source.recv()).await;
        assert!(fired.is_err());
    }
}
