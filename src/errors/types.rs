//! Error types surfaced by the offload engine.
//!
//! Errors fall into two families with different propagation rules.
//! Producer-side errors ([`EnqueueError`], [`StateError`], [`ProcessorError`])
//! are returned synchronously from the producer API. Execution-side errors
//! ([`TaskError`]) are never raised; they are delivered to the task's
//! [`TaskHandler`](crate::processor::TaskHandler) through `on_error` and must
//! survive serialization, since handlers typically forward them to an
//! external job queue.

use crate::errors::categories::{HttpErrorClass, RedirectErrorKind, RequestErrorKind};
use crate::processor::lifecycle::LifecycleState;
use crate::types::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Execution-side error delivered to `TaskHandler::on_error`.
///
/// Carries the originating request's method, URL and `callback_args` so the
/// handler can route the failure without holding any other task state.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind} ({method} {url})")]
pub struct TaskError {
    /// What went wrong.
    pub kind: TaskErrorKind,
    /// Method of the originating request.
    pub method: String,
    /// URL of the originating request.
    pub url: Url,
    /// Callback arguments forwarded verbatim from the task.
    pub callback_args: Value,
}

impl TaskError {
    /// Build an error echoing the identity of `request`.
    pub(crate) fn new(request: &Request, callback_args: Value, kind: TaskErrorKind) -> Self {
        Self {
            kind,
            method: request.method().to_string(),
            url: request.url().clone(),
            callback_args,
        }
    }

    /// HTTP status of the failure, when one was received.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            TaskErrorKind::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure variants carried by [`TaskError`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The request could not be formed or dispatched.
    #[error("{kind}: {message}")]
    Request {
        /// Transport-level failure classification.
        kind: RequestErrorKind,
        /// Human-readable detail from the transport.
        message: String,
    },

    /// A response was received but the task opted into treating the status
    /// as a failure.
    #[error("http {status} ({class})")]
    Http {
        /// Response status code.
        status: u16,
        /// 4xx or 5xx.
        class: HttpErrorClass,
        /// Response body, captured up to the configured size limit.
        body: Option<String>,
    },

    /// The redirect chain was abandoned.
    #[error("{kind} at {url}")]
    Redirect {
        /// Cap exceeded or cycle detected.
        kind: RedirectErrorKind,
        /// Final URL of the chain.
        url: Url,
    },

    /// The response body exceeded the configured maximum.
    #[error("response exceeded {limit} bytes")]
    ResponseTooLarge {
        /// Configured maximum in bytes.
        limit: u64,
        /// Bytes observed before aborting.
        received: u64,
    },
}

/// Error returned synchronously from `Processor::enqueue`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// The processor is not in the `Running` state.
    #[error("processor is not accepting work (state: {state})")]
    NotRunning {
        /// Observed lifecycle state.
        state: LifecycleState,
    },

    /// Queue plus in-flight tasks reached the configured capacity.
    #[error("capacity exceeded ({queue_len} queued, {in_flight} in flight)")]
    MaxCapacity {
        /// Tasks waiting in the queue at rejection time.
        queue_len: usize,
        /// Tasks executing at rejection time.
        in_flight: usize,
    },
}

/// An attempted lifecycle transition that the state machine does not permit.
///
/// The state cell is left unchanged when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid lifecycle transition: {from} -> {attempted}")]
pub struct StateError {
    /// State observed at the time of the attempt.
    pub from: LifecycleState,
    /// State the caller tried to move to.
    pub attempted: LifecycleState,
}

/// Error returned from `Processor::start` and `Processor::stop`.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// The lifecycle state machine rejected the operation.
    #[error(transparent)]
    State(#[from] StateError),

    /// The reactor thread or runtime could not be brought up.
    #[error("reactor startup failed: {message}")]
    Startup {
        /// Underlying failure detail.
        message: String,
    },

    /// The reactor thread did not shut down cleanly.
    #[error("reactor shutdown failed: {message}")]
    Shutdown {
        /// Underlying failure detail.
        message: String,
    },
}

/// Error raised while constructing a [`Request`](crate::types::Request).
#[derive(Error, Debug)]
pub enum RequestBuildError {
    /// GET and DELETE requests must not carry a body.
    #[error("body not allowed for {method} requests")]
    BodyNotAllowed {
        /// Offending method.
        method: String,
    },

    /// The URL did not parse.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A relative URL was given without a template base URL to resolve it.
    #[error("relative url {url:?} requires a template base_url")]
    RelativeUrl {
        /// The unresolvable URL as given.
        url: String,
    },

    /// Methods outside GET/POST/PUT/PATCH/DELETE are rejected.
    #[error("unsupported method: {method}")]
    UnsupportedMethod {
        /// Offending method.
        method: String,
    },

    /// A JSON body failed to serialize.
    #[error("invalid json body: {0}")]
    InvalidJsonBody(#[from] serde_json::Error),
}

/// Error from a [`PayloadStore`](crate::storage::PayloadStore) adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No payload exists under the given key.
    #[error("payload {key:?} not found")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// Filesystem-level failure.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("storage backend error: {message}")]
    Backend {
        /// Adapter-provided detail.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_error() -> TaskError {
        TaskError {
            kind: TaskErrorKind::Http {
                status: 503,
                class: HttpErrorClass::Server,
                body: Some("overloaded".to_string()),
            },
            method: "POST".to_string(),
            url: Url::parse("https://api.example.com/jobs").unwrap(),
            callback_args: serde_json::json!({"job_id": 42}),
        }
    }

    #[test]
    fn test_task_error_round_trip() {
        let err = sample_error();
        let json = serde_json::to_string(&err).unwrap();
        let back: TaskError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
        assert_eq!(back.status(), Some(503));
        assert_eq!(back.callback_args["job_id"], 42);
    }

    #[test]
    fn test_task_error_display_carries_request_identity() {
        let err = sample_error();
        let rendered = err.to_string();
        assert!(rendered.contains("POST"));
        assert!(rendered.contains("https://api.example.com/jobs"));
    }

    #[test]
    fn test_redirect_error_serialization() {
        let err = TaskError {
            kind: TaskErrorKind::Redirect {
                kind: RedirectErrorKind::TooMany,
                url: Url::parse("https://a.example.com/3").unwrap(),
            },
            method: "GET".to_string(),
            url: Url::parse("https://a.example.com/start").unwrap(),
            callback_args: Value::Null,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"]["type"], "redirect");
        assert_eq!(json["kind"]["kind"], "too_many");
    }

    #[test]
    fn test_enqueue_error_display() {
        let err = EnqueueError::MaxCapacity {
            queue_len: 10,
            in_flight: 4,
        };
        assert!(err.to_string().contains("10 queued"));
    }
}
