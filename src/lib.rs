//! # http-offload
//!
//! In-process asynchronous HTTP offload engine.
//!
//! Application threads hand outbound HTTP requests to a dedicated
//! concurrent processor; the processor multiplexes hundreds of in-flight
//! requests over pooled, HTTP/2-capable connections and delivers results
//! through a pluggable task handler, typically one that forwards to an
//! external job queue. Producer calls never block on network I/O.
//!
//! ## Features
//!
//! - Lifecycle state machine with a graceful-drain shutdown protocol
//! - Bounded admission: queue and concurrency caps enforced at `enqueue`
//! - Per-origin client pooling with LRU eviction and failure retirement
//! - Manual redirect policy: caps, cycle detection, credential hygiene
//! - Streaming response reads with a hard size limit and gzip/deflate
//!   decompression
//! - Payload offload: oversized bodies parked in a pluggable store
//! - Serializable request/response/error model
//! - Inline [`SynchronousExecutor`] for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use http_offload::{
//!     HandlerResult, Processor, ProcessorConfig, Request, RequestTask, Response, TaskError,
//!     TaskHandler,
//! };
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct QueueForwarder;
//!
//! #[async_trait]
//! impl TaskHandler for QueueForwarder {
//!     async fn on_complete(&self, _response: Response, _callback: &str) -> HandlerResult {
//!         // Copy what you need and enqueue to your own system; this runs
//!         // on the reactor thread.
//!         Ok(())
//!     }
//!
//!     async fn on_error(&self, _error: TaskError, _callback: &str) -> HandlerResult {
//!         Ok(())
//!     }
//!
//!     async fn retry(&self, _task: RequestTask) -> HandlerResult {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = Processor::new(ProcessorConfig::default());
//!     processor.start()?;
//!
//!     let request = Request::get("https://api.example.com/jobs/42").build()?;
//!     let task = RequestTask::new(request, Arc::new(QueueForwarder), "jobs::Fetch");
//!     let _task_id = processor.enqueue(task)?;
//!
//!     processor.stop(None)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `config` - Processor configuration and defaults
//! - `errors` - Error taxonomy (producer-side and execution-side)
//! - `types` - Requests, responses, headers, payloads, task bindings
//! - `storage` - Payload store contract, offload policy and adapters
//! - `transport` - Per-origin clients, pooling, bounded reads, redirects
//! - `processor` - Lifecycle, reactor, executor, handler and observer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod errors;
pub mod processor;
pub mod storage;
pub mod transport;
pub mod types;

pub use config::ProcessorConfig;
pub use errors::{
    EnqueueError, HttpErrorClass, ProcessorError, RedirectErrorKind, RequestBuildError,
    RequestErrorKind, StateError, StorageError, TaskError, TaskErrorKind,
};
pub use processor::{
    HandlerError, HandlerResult, LifecycleState, NoopObserver, Processor, ProcessorObserver,
    SynchronousExecutor, TaskHandler,
};
pub use storage::{ExternalStorage, FileStore, MemoryStore, PayloadStore};
pub use transport::{ClientPool, Origin, OriginClient};
pub use types::{
    HttpHeaders, Payload, Request, RequestBuilder, RequestTask, RequestTemplate, Response, TaskId,
    TaskOutcome,
};
