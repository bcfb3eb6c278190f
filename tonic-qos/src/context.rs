//! Per-call context: deadline and cancellation.
//!
//! A [`CallContext`] travels with every [`UnaryRequest`](crate::UnaryRequest)
//! through the interceptor chain. Derived contexts share the parent's
//! cancellation (cancelling a parent cancels all of its children) and can
//! only shorten the parent's deadline, never extend it.
//!
//! # Example
//!
//! ```ignore
//! use tonic_qos::CallContext;
//! use std::time::Duration;
//!
//! let ctx = CallContext::new();
//! let (ctx, cancel) = ctx.with_timeout(Duration::from_secs(5));
//!
//! let result = client.call_unary::<Req, Res>(&ctx, "/pkg.Service/Method", &req, []).await;
//! cancel.cancel();
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::CallError;

/// Deadline and cancellation scope of a single call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl CallContext {
    /// Create a root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// The absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, if any. Zero once the deadline passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Derive a cancellable child context.
    pub fn with_cancel(&self) -> (CallContext, CancelFn) {
        let token = self.token.child_token();
        let child = CallContext {
            deadline: self.deadline,
            token: token.clone(),
        };
        (child, CancelFn(Some(token)))
    }

    /// Derive a child context that expires after `timeout`.
    ///
    /// The child deadline is the earlier of the parent's deadline and
    /// `now + timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> (CallContext, CancelFn) {
        let (mut child, cancel) = self.with_cancel();
        // An unrepresentable deadline is no deadline at all.
        if let Some(deadline) = Instant::now().checked_add(timeout) {
            child.deadline = Some(match self.deadline {
                Some(parent) if parent < deadline => parent,
                _ => deadline,
            });
        }
        (child, cancel)
    }

    /// Returns true once the context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason this context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<CallError> {
        if self.token.is_cancelled() {
            return Some(CallError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CallError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is cancelled or its deadline passes, and
    /// return the reason.
    pub async fn done(&self) -> CallError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CallError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CallError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CallError::Cancelled
            }
        }
    }

    /// Run `fut` within this context.
    ///
    /// Returns the context error instead of polling `fut` when the context
    /// is already done, and abandons `fut` as soon as the context finishes.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, CallError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            result = fut => result,
            err = self.done() => Err(err),
        }
    }
}

/// Cancels a derived [`CallContext`].
///
/// Dropping a `CancelFn` does not cancel anything; call [`CancelFn::cancel`]
/// once the derived context is no longer needed.
#[derive(Debug, Default)]
#[must_use = "call `cancel` when the derived context is no longer needed"]
pub struct CancelFn(Option<CancellationToken>);

impl CancelFn {
    /// A cancel function that does nothing.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Cancel the derived context and every context derived from it.
    pub fn cancel(self) {
        if let Some(token) = self.0 {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_context_is_live() {
        let ctx = CallContext::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(ctx.err().is_none());
    }

    #[tokio::test]
    async fn test_cancel_parent_cancels_child() {
        let (parent, cancel) = CallContext::new().with_cancel();
        let (child, _child_cancel) = parent.with_timeout(Duration::from_secs(60));

        cancel.cancel();

        assert!(parent.is_cancelled());
        assert!(matches!(child.err(), Some(CallError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_child_keeps_parent_live() {
        let parent = CallContext::new();
        let (child, cancel) = parent.with_cancel();

        cancel.cancel();

        assert!(child.is_cancelled());
        assert!(parent.err().is_none());
    }

    #[tokio::test]
    async fn test_noop_cancel() {
        let ctx = CallContext::new();
        CancelFn::noop().cancel();
        assert!(ctx.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_deadline_never_extends_parent() {
        let (parent, _p) = CallContext::new().with_timeout(Duration::from_secs(1));
        let (child, _c) = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let (shorter, _s) = parent.with_timeout(Duration::from_millis(100));
        assert!(shorter.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_exceeded() {
        let (ctx, _cancel) = CallContext::new().with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CallError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_run_already_cancelled() {
        let (ctx, cancel) = CallContext::new().with_cancel();
        cancel.cancel();

        let result = ctx.run(async { Ok(42) }).await;
        assert!(matches!(result, Err(CallError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_completes() {
        let (ctx, _cancel) = CallContext::new().with_timeout(Duration::from_secs(5));
        let result = ctx.run(async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
