//! Inline executor for test mode.

use crate::config::ProcessorConfig;
use crate::errors::{EnqueueError, ProcessorError};
use crate::processor::executor::{run_task, ExecutionEnv};
use crate::processor::observer::{NoopObserver, ProcessorObserver};
use crate::storage::{ExternalStorage, PayloadStore};
use crate::types::{RequestTask, TaskId};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Test double exposing the processor's `enqueue` surface but running each
/// task inline on the caller.
///
/// The full execution pipeline is identical to the real processor's —
/// client pooling, redirects, size limits, payload offload, handler
/// delivery — minus the reactor and queue: `enqueue` returns only after the
/// handler has been invoked. Swap it in at construction time when a global
/// testing flag is set.
///
/// Owns a private single-threaded runtime, so it must be called from
/// synchronous code (a plain `#[test]`, or `spawn_blocking` inside an async
/// test), never from within another runtime.
pub struct SynchronousExecutor {
    runtime: tokio::runtime::Runtime,
    env: ExecutionEnv,
    observer: Arc<dyn ProcessorObserver>,
}

impl SynchronousExecutor {
    /// Create an executor with no payload store and no observer.
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorError> {
        Self::with_parts(config, None, Arc::new(NoopObserver))
    }

    /// Create an executor with every collaborator supplied explicitly.
    pub fn with_parts(
        config: ProcessorConfig,
        payload_store: Option<Arc<dyn PayloadStore>>,
        observer: Arc<dyn ProcessorObserver>,
    ) -> Result<Self, ProcessorError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProcessorError::Startup {
                message: format!("failed to build inline runtime: {e}"),
            })?;
        let storage = match payload_store {
            Some(store) => ExternalStorage::new(store, config.external_payload_threshold),
            None => ExternalStorage::disabled(),
        };
        Ok(Self {
            runtime,
            env: ExecutionEnv::new(config, storage),
            observer,
        })
    }

    /// Execute `task` to its terminal delivery and return its id.
    ///
    /// Mirrors `Processor::enqueue`'s signature so call sites swap cleanly;
    /// inline execution has no queue, so admission never fails.
    pub fn enqueue(&self, task: RequestTask) -> Result<TaskId, EnqueueError> {
        let id = TaskId::new();
        let delivered = AtomicBool::new(false);
        self.runtime.block_on(run_task(
            &self.env,
            self.observer.as_ref(),
            id,
            &task,
            &delivered,
        ));
        Ok(id)
    }
}
