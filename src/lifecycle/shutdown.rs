//! Deadline-bounded shutdown sequence.
//!
//! # Data Flow
//! ```text
//! trigger decided
//!     → ShutdownSequence::new(root.with_timeout(shutdown_timeout))
//!     → step(server) for each server, launch order
//!     → step(application)
//!     → ShutdownReport { failures, elapsed }
//! ```
//!
//! # Design Decisions
//! - A failed or overdue step is recorded and the next step still runs
//! - The sequence never waits on a step past the deadline; once the deadline
//!   has passed, later steps are still invoked and polled once
//! - Steps are awaited, never aborted: an overdue component keeps its task

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::BoxError;
use crate::lifecycle::Context;
use crate::observability::metrics;

/// Why a shutdown step did not complete cleanly.
#[derive(Debug)]
pub enum ShutdownFailure {
    /// The component's shutdown returned an error.
    Failed {
        component: String,
        error: BoxError,
    },
    /// The component's shutdown was still pending at the deadline.
    DeadlineExceeded { component: String },
}

impl ShutdownFailure {
    pub fn component(&self) -> &str {
        match self {
            ShutdownFailure::Failed { component, .. } => component,
            ShutdownFailure::DeadlineExceeded { component } => component,
        }
    }
}

impl fmt::Display for ShutdownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownFailure::Failed { component, error } => {
                write!(f, "{} failed to shut down: {}", component, error)
            }
            ShutdownFailure::DeadlineExceeded { component } => {
                write!(f, "{} did not shut down before the deadline", component)
            }
        }
    }
}

/// What happened during the shutdown sequence.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub failures: Vec<ShutdownFailure>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Whether every step completed without error before the deadline.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs shutdown steps one after another under a shared deadline.
pub struct ShutdownSequence {
    ctx: Context,
    started: Instant,
    report: ShutdownReport,
}

impl ShutdownSequence {
    /// Start a sequence bounded by `ctx`'s deadline.
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            started: Instant::now(),
            report: ShutdownReport::default(),
        }
    }

    /// Context to hand to each component's `shutdown`.
    pub fn context(&self) -> Context {
        self.ctx.clone()
    }

    /// Await one component's shutdown, bounded by the deadline.
    ///
    /// `kind` labels the metrics ("server" or "application").
    pub async fn step<F>(&mut self, kind: &'static str, component: &str, shutdown: F)
    where
        F: Future<Output = Result<(), BoxError>>,
    {
        tracing::info!(component = %component, kind, "Shutting down component");

        let result = match self.ctx.deadline() {
            Some(deadline) => tokio::time::timeout_at(deadline, shutdown).await,
            None => Ok(shutdown.await),
        };

        let failure = match result {
            Ok(Ok(())) => {
                tracing::debug!(component = %component, "Component shut down");
                return;
            }
            Ok(Err(error)) => ShutdownFailure::Failed {
                component: component.to_string(),
                error,
            },
            Err(_) => ShutdownFailure::DeadlineExceeded {
                component: component.to_string(),
            },
        };

        tracing::error!(component = %component, kind, error = %failure, "Shutdown step failed");
        metrics::record_shutdown_error(kind);
        self.report.failures.push(failure);
    }

    /// Cancel the sequence's context and return the report.
    pub fn finish(mut self) -> ShutdownReport {
        self.ctx.cancel();
        self.report.elapsed = self.started.elapsed();
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn failure_does_not_stop_later_steps() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut seq = ShutdownSequence::new(Context::new().with_timeout(Duration::from_secs(1)));

        for name in ["a", "b"] {
            let calls = Arc::clone(&calls);
            seq.step("server", name, async move {
                calls.lock().unwrap().push(name);
                if name == "a" {
                    Err::<(), BoxError>("boom".into())
                } else {
                    Ok(())
                }
            })
            .await;
        }

        let report = seq.finish();
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].component(), "a");
        assert!(report.failures[0].to_string().contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_step_is_cut_at_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        let mut seq = ShutdownSequence::new(ctx.clone());

        seq.step("server", "slow", async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;

        // Deadline already passed: the step still runs once.
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        seq.step("application", "app", async move {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .await;

        let report = seq.finish();
        assert!(*ran.lock().unwrap());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            ShutdownFailure::DeadlineExceeded { .. }
        ));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn clean_report() {
        let mut seq = ShutdownSequence::new(Context::new());
        seq.step("application", "app", async { Ok(()) }).await;
        assert!(seq.finish().is_clean());
    }
}
