//! Task binding handed to the processor.

use crate::processor::TaskHandler;
use crate::types::request::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Locally-generated identifier for an accepted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request bound to the handler that will receive its outcome.
///
/// `callback` is an opaque selector the engine never inspects; it flows
/// verbatim from the task to the handler, as do `callback_args`.
#[derive(Clone)]
pub struct RequestTask {
    /// The request to execute.
    pub request: Request,
    /// Sink for the terminal outcome.
    pub handler: Arc<dyn TaskHandler>,
    /// Opaque handler-selector, uninterpreted by the engine.
    pub callback: String,
    /// Opaque arguments echoed on every response and error.
    pub callback_args: Value,
}

impl RequestTask {
    /// Bind `request` to `handler` under the given callback selector.
    pub fn new(request: Request, handler: Arc<dyn TaskHandler>, callback: impl Into<String>) -> Self {
        Self {
            request,
            handler,
            callback: callback.into(),
            callback_args: Value::Null,
        }
    }

    /// Attach callback arguments forwarded verbatim to the handler.
    pub fn with_callback_args(mut self, args: Value) -> Self {
        self.callback_args = args;
        self
    }
}

impl fmt::Debug for RequestTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTask")
            .field("request", &self.request)
            .field("callback", &self.callback)
            .field("callback_args", &self.callback_args)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TaskError;
    use crate::processor::HandlerResult;
    use crate::types::Response;
    use async_trait::async_trait;

    struct NullHandler;

    #[async_trait]
    impl TaskHandler for NullHandler {
        async fn on_complete(&self, _response: Response, _callback: &str) -> HandlerResult {
            Ok(())
        }

        async fn on_error(&self, _error: TaskError, _callback: &str) -> HandlerResult {
            Ok(())
        }

        async fn retry(&self, _task: RequestTask) -> HandlerResult {
            Ok(())
        }
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn test_callback_flows_verbatim() {
        let request = Request::get("https://example.com/").build().unwrap();
        let task = RequestTask::new(request, Arc::new(NullHandler), "jobs::Ingest")
            .with_callback_args(serde_json::json!(["a", 1]));
        assert_eq!(task.callback, "jobs::Ingest");
        assert_eq!(task.callback_args, serde_json::json!(["a", 1]));
    }
}
