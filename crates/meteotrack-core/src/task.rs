use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

/// Boxed future returned by [`ManagedTask::join`].
pub type JoinFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A long-lived background task owned by the [`App`](crate::App).
///
/// Cancellation is cooperative: `cancel` only signals, `join` waits for the
/// task to reach a safe stopping point.
pub trait ManagedTask: Send {
    /// Human-readable name
    fn name(&self) -> &str;

    /// Signal the task to stop. Must not block.
    fn cancel(&self);

    /// Whether the task has already exited.
    fn is_finished(&self) -> bool;

    /// Wait for the task to exit.
    fn join(self: Box<Self>) -> JoinFuture;
}
