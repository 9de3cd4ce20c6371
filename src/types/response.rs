//! Response value delivered to task handlers.

use crate::errors::TaskError;
use crate::types::headers::HttpHeaders;
use crate::types::payload::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// An immutable, serializable HTTP response.
///
/// Echoes the originating request's method and URL and forwards the task's
/// `callback_args` verbatim so a handler can route the result without any
/// other context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response status code (100..=599).
    pub status: u16,
    /// Response headers.
    pub headers: HttpHeaders,
    /// Response body; `None` for empty bodies. May be `Stored` when the
    /// body was offloaded to external storage.
    pub body: Option<Payload>,
    /// Method of the originating request.
    pub method: String,
    /// URL of the originating request.
    pub url: Url,
    /// Callback arguments forwarded verbatim from the task.
    pub callback_args: Value,
}

impl Response {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body bytes when held inline; `None` for empty or stored bodies.
    pub fn inline_body(&self) -> Option<&[u8]> {
        self.body
            .as_ref()
            .and_then(Payload::as_inline)
            .map(|bytes| bytes.as_ref())
    }
}

/// Terminal outcome of one task, as seen by observers.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The exchange produced a response that was handed to `on_complete`.
    Completed(Response),
    /// The exchange failed; the error was handed to `on_error`.
    Failed(TaskError),
}

impl TaskOutcome {
    /// Whether this outcome is a completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_round_trip() {
        let response = Response {
            status: 200,
            headers: [("content-type", "text/plain")].into_iter().collect(),
            body: Some(Payload::inline("ok")),
            method: "GET".to_string(),
            url: Url::parse("https://example.com/health").unwrap(),
            callback_args: serde_json::json!({"tenant": "acme"}),
        };

        let json = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
        assert!(back.is_success());
        assert_eq!(back.inline_body(), Some(b"ok".as_ref()));
        assert_eq!(back.callback_args["tenant"], "acme");
    }

    #[test]
    fn test_empty_body() {
        let response = Response {
            status: 204,
            headers: HttpHeaders::new(),
            body: None,
            method: "DELETE".to_string(),
            url: Url::parse("https://example.com/jobs/9").unwrap(),
            callback_args: Value::Null,
        };
        assert!(response.is_success());
        assert_eq!(response.inline_body(), None);
    }
}
