//! Value types shared across the engine: headers, requests, responses,
//! payloads and task bindings.
//!
//! Everything here is deep-immutable after construction and safe to share
//! by reference across threads. Requests, responses and payloads are
//! serializable because they cross the task-handler boundary.

pub mod headers;
pub mod payload;
pub mod request;
pub mod response;
pub mod task;

pub use headers::HttpHeaders;
pub use payload::Payload;
pub use request::{Request, RequestBuilder, RequestTemplate};
pub use response::{Response, TaskOutcome};
pub use task::{RequestTask, TaskId};
