//! Error category enums shared across the execution pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure that prevented a request from being formed
/// or dispatched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestErrorKind {
    /// Connection could not be established (refused, unreachable).
    #[error("connection failed")]
    Connect,
    /// Hostname did not resolve.
    #[error("dns resolution failed")]
    Dns,
    /// TLS handshake or certificate validation failed.
    #[error("tls handshake failed")]
    Tls,
    /// The overall request timeout elapsed.
    #[error("request timed out")]
    Timeout,
    /// Socket or protocol level I/O failure (reset, premature EOF).
    #[error("i/o failure")]
    Io,
    /// A stored payload could not be materialized before dispatch.
    #[error("payload storage failure")]
    Storage,
}

impl RequestErrorKind {
    /// Whether the transport-level retry budget applies to this kind.
    ///
    /// Only connect and I/O failures are retried; timeouts are governed by
    /// the overall request deadline and everything else is terminal.
    pub fn is_retryable(self) -> bool {
        matches!(self, RequestErrorKind::Connect | RequestErrorKind::Io)
    }
}

/// Status class of an HTTP response treated as a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpErrorClass {
    /// 4xx response.
    #[error("client error")]
    Client,
    /// 5xx response.
    #[error("server error")]
    Server,
}

impl HttpErrorClass {
    /// Classify a status code, returning `None` for non-error statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400..=499 => Some(HttpErrorClass::Client),
            500..=599 => Some(HttpErrorClass::Server),
            _ => None,
        }
    }
}

/// Why a redirect chain was abandoned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectErrorKind {
    /// The chain exceeded the request's redirect cap.
    #[error("too many redirects")]
    TooMany,
    /// The chain revisited an already-seen URL.
    #[error("recursive redirect")]
    Recursive,
}
