//! Instrumentation hooks.

use crate::processor::lifecycle::LifecycleState;
use crate::types::{Request, TaskId, TaskOutcome};

/// Fire-and-forget instrumentation signals emitted by the processor.
///
/// Every method has a no-op default, so implementations override only what
/// they need. Methods are called from the reactor thread (and
/// `capacity_exceeded` from producer threads) and must not block.
pub trait ProcessorObserver: Send + Sync {
    /// The reactor is up and accepting work.
    fn started(&self) {}

    /// The reactor has shut down.
    fn stopped(&self) {}

    /// A task was dispatched to the execution pipeline.
    fn request_started(&self, _id: TaskId, _request: &Request) {}

    /// A task reached its terminal outcome.
    fn request_ended(&self, _id: TaskId, _outcome: &TaskOutcome) {}

    /// An internal error that was contained (e.g. a handler failure).
    fn error(&self, _context: &str, _detail: &str) {}

    /// An `enqueue` was rejected at capacity.
    fn capacity_exceeded(&self, _queue_len: usize, _in_flight: usize) {}

    /// A lifecycle transition succeeded.
    fn state_transition(&self, _from: LifecycleState, _to: LifecycleState) {}
}

/// Observer that ignores every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProcessorObserver for NoopObserver {}
