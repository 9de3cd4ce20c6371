//! Shared recording doubles for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use http_offload::{
    HandlerResult, LifecycleState, ProcessorObserver, Request, RequestTask, Response, TaskError,
    TaskHandler, TaskId, TaskOutcome,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Task handler that records every delivery.
#[derive(Default)]
pub struct RecordingHandler {
    pub completed: Mutex<Vec<(Response, String)>>,
    pub errors: Mutex<Vec<(TaskError, String)>>,
    pub retried: Mutex<Vec<RequestTask>>,
    pub fail_deliveries: AtomicBool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `on_complete`/`on_error` return an error, to exercise the
    /// handler-failure containment path.
    pub fn failing() -> Self {
        let handler = Self::default();
        handler.fail_deliveries.store(true, Ordering::Relaxed);
        handler
    }

    pub fn completed_count(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn retried_count(&self) -> usize {
        self.retried.lock().unwrap().len()
    }

    /// Total terminal deliveries of any kind.
    pub fn delivery_count(&self) -> usize {
        self.completed_count() + self.error_count() + self.retried_count()
    }

    /// Poll until `count` terminal deliveries have been observed.
    pub async fn wait_for_deliveries(&self, count: usize) {
        wait_until(|| self.delivery_count() >= count).await;
    }
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn on_complete(&self, response: Response, callback: &str) -> HandlerResult {
        self.completed
            .lock()
            .unwrap()
            .push((response, callback.to_string()));
        if self.fail_deliveries.load(Ordering::Relaxed) {
            return Err("handler exploded".into());
        }
        Ok(())
    }

    async fn on_error(&self, error: TaskError, callback: &str) -> HandlerResult {
        self.errors
            .lock()
            .unwrap()
            .push((error, callback.to_string()));
        if self.fail_deliveries.load(Ordering::Relaxed) {
            return Err("handler exploded".into());
        }
        Ok(())
    }

    async fn retry(&self, task: RequestTask) -> HandlerResult {
        self.retried.lock().unwrap().push(task);
        Ok(())
    }
}

/// Observer that records every signal.
#[derive(Default)]
pub struct RecordingObserver {
    pub started_requests: Mutex<Vec<TaskId>>,
    pub ended_requests: Mutex<Vec<(TaskId, bool)>>,
    pub capacity_events: Mutex<Vec<(usize, usize)>>,
    pub transitions: Mutex<Vec<(LifecycleState, LifecycleState)>>,
    pub contained_errors: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessorObserver for RecordingObserver {
    fn request_started(&self, id: TaskId, _request: &Request) {
        self.started_requests.lock().unwrap().push(id);
    }

    fn request_ended(&self, id: TaskId, outcome: &TaskOutcome) {
        self.ended_requests
            .lock()
            .unwrap()
            .push((id, outcome.is_completed()));
    }

    fn capacity_exceeded(&self, queue_len: usize, in_flight: usize) {
        self.capacity_events
            .lock()
            .unwrap()
            .push((queue_len, in_flight));
    }

    fn state_transition(&self, from: LifecycleState, to: LifecycleState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn error(&self, context: &str, detail: &str) {
        self.contained_errors
            .lock()
            .unwrap()
            .push((context.to_string(), detail.to_string()));
    }
}

/// Route engine logs to the test output. Call at the top of a test while
/// debugging it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Poll `condition` every few milliseconds, panicking after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within 5s");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
