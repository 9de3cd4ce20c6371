//! Task handler capability set.

use crate::errors::TaskError;
use crate::types::{RequestTask, Response};
use async_trait::async_trait;

/// Error type handlers may return; it is logged and reported to the
/// observer, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler callbacks.
pub type HandlerResult = Result<(), HandlerError>;

/// Sink for terminal task outcomes.
///
/// Callbacks execute on the reactor's cooperative thread: implementations
/// must be non-blocking and fast (copy what they need and enqueue to their
/// own system). Heavy work here degrades every in-flight request.
///
/// For each accepted task exactly one of `on_complete`, `on_error` or
/// `retry` is invoked.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// A response was produced. `callback` is the task's opaque selector.
    async fn on_complete(&self, response: Response, callback: &str) -> HandlerResult;

    /// The exchange failed. `callback` is the task's opaque selector.
    async fn on_error(&self, error: TaskError, callback: &str) -> HandlerResult;

    /// The task was surrendered during shutdown before completing. The
    /// handler owns re-enqueuing it externally.
    async fn retry(&self, task: RequestTask) -> HandlerResult;
}
