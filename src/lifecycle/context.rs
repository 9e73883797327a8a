//! Cancellation context handed to every supervised component.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// Children are cancelled with their parent. A deadline that has passed
/// counts as cancellation for [`Context::is_cancelled`] and
/// [`Context::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A new root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child sharing this context's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child that also expires `timeout` from now. A timeout too large to
    /// represent as an instant sets no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// A child that also expires at `deadline`. The parent's deadline wins if
    /// it is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes once the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// The underlying token, for APIs that take one directly.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_cancelled_with_parent() {
        let root = Context::new();
        let child = root.child();
        assert!(!child.is_cancelled());

        root.cancel();
        assert!(child.is_cancelled());
        child.cancelled().await;
    }

    #[tokio::test]
    async fn cancelling_child_leaves_parent() {
        let root = Context::new();
        let child = root.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_never_extends_parent() {
        let root = Context::new();
        let short = root.with_timeout(Duration::from_millis(50));
        let long = short.with_timeout(Duration::from_secs(60));
        assert_eq!(long.deadline(), short.deadline());
        assert!(long.remaining().unwrap() <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn unrepresentable_timeout_means_no_deadline() {
        let ctx = Context::new().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert!(!ctx.is_cancelled());

        let bounded = Context::new().with_timeout(Duration::from_secs(5));
        let child = bounded.with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(child.deadline(), bounded.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_counts_as_cancellation() {
        let ctx = Context::new().with_timeout(Duration::from_secs(10));
        assert!(!ctx.is_cancelled());

        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
