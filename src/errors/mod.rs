//! Error taxonomy for the offload engine.
//!
//! Producer-side errors are raised synchronously; execution-side errors are
//! wrapped in [`TaskError`] and delivered through the task handler. See the
//! module docs on [`types`] for the propagation rules.

pub mod categories;
pub mod types;

pub use categories::{HttpErrorClass, RedirectErrorKind, RequestErrorKind};
pub use types::{
    EnqueueError, ProcessorError, RequestBuildError, StateError, StorageError, TaskError,
    TaskErrorKind,
};
