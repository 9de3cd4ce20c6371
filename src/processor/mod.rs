//! The concurrent processor: admission, the reactor loop, and the
//! graceful-drain protocol.

pub mod executor;
pub mod handler;
pub mod lifecycle;
pub mod observer;
pub mod sync;

pub use handler::{HandlerError, HandlerResult, TaskHandler};
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use observer::{NoopObserver, ProcessorObserver};
pub use sync::SynchronousExecutor;

use crate::config::ProcessorConfig;
use crate::errors::{EnqueueError, ProcessorError, StateError};
use crate::processor::executor::{run_task, ExecutionEnv};
use crate::storage::{ExternalStorage, PayloadStore};
use crate::types::{RequestTask, TaskId};
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Asynchronous HTTP offload processor.
///
/// Producers call [`enqueue`](Processor::enqueue) from any thread; a
/// dedicated reactor thread hosts a cooperative scheduler that multiplexes
/// all in-flight exchanges over pooled connections and delivers outcomes to
/// each task's [`TaskHandler`]. Producer calls never touch the network.
///
/// The processor is created stopped; [`start`](Processor::start) brings the
/// reactor up and [`stop`](Processor::stop) drains and shuts it down,
/// surrendering unfinished tasks to `TaskHandler::retry`.
pub struct Processor {
    shared: Arc<Shared>,
    reactor: Mutex<Option<thread::JoinHandle<()>>>,
}

struct Shared {
    config: ProcessorConfig,
    lifecycle: LifecycleManager,
    observer: Arc<dyn ProcessorObserver>,
    storage: ExternalStorage,
    queue: Mutex<VecDeque<QueuedTask>>,
    queue_len: AtomicUsize,
    in_flight: AtomicUsize,
    wake: Notify,
    drain: Mutex<DrainFlags>,
    drain_cv: Condvar,
}

struct QueuedTask {
    id: TaskId,
    task: RequestTask,
}

#[derive(Default)]
struct DrainFlags {
    drained: bool,
    stopped: bool,
}

struct InFlightEntry {
    task: RequestTask,
    delivered: Arc<AtomicBool>,
    abort: tokio::task::AbortHandle,
}

impl Shared {
    fn signal_drained(&self) {
        let mut flags = self.drain.lock();
        flags.drained = true;
        self.drain_cv.notify_all();
    }

    fn signal_stopped(&self) {
        let mut flags = self.drain.lock();
        flags.stopped = true;
        self.drain_cv.notify_all();
    }
}

impl Processor {
    /// Create a processor with no payload store and no observer.
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_parts(config, None, Arc::new(NoopObserver))
    }

    /// Create a processor with every collaborator supplied explicitly.
    pub fn with_parts(
        config: ProcessorConfig,
        payload_store: Option<Arc<dyn PayloadStore>>,
        observer: Arc<dyn ProcessorObserver>,
    ) -> Self {
        let storage = match payload_store {
            Some(store) => ExternalStorage::new(store, config.external_payload_threshold),
            None => ExternalStorage::disabled(),
        };
        let shared = Arc::new(Shared {
            lifecycle: LifecycleManager::new(observer.clone()),
            observer,
            storage,
            queue: Mutex::new(VecDeque::new()),
            queue_len: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            wake: Notify::new(),
            drain: Mutex::new(DrainFlags::default()),
            drain_cv: Condvar::new(),
            config,
        });
        Self {
            shared,
            reactor: Mutex::new(None),
        }
    }

    /// Bring the reactor up. Idempotent; returns once the reactor accepts
    /// work. Fails while a previous shutdown is still in progress.
    pub fn start(&self) -> Result<(), ProcessorError> {
        match self.shared.lifecycle.state() {
            LifecycleState::Running => return Ok(()),
            LifecycleState::Stopping => {
                return Err(StateError {
                    from: LifecycleState::Stopping,
                    attempted: LifecycleState::Starting,
                }
                .into())
            }
            _ => {}
        }

        self.shared.lifecycle.start()?;
        {
            let mut flags = self.shared.drain.lock();
            flags.drained = false;
            flags.stopped = false;
        }

        let shared = self.shared.clone();
        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("http-offload-reactor".to_string())
            .spawn(move || reactor_main(shared, ready_tx))
            .map_err(|e| {
                self.shared.lifecycle.abort_start();
                ProcessorError::Startup {
                    message: e.to_string(),
                }
            })?;
        *self.reactor.lock() = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => {
                if let Some(handle) = self.reactor.lock().take() {
                    let _ = handle.join();
                }
                Err(ProcessorError::Startup { message })
            }
            Err(_) => {
                if let Some(handle) = self.reactor.lock().take() {
                    let _ = handle.join();
                }
                self.shared.lifecycle.abort_start();
                Err(ProcessorError::Startup {
                    message: "reactor thread exited before signalling readiness".to_string(),
                })
            }
        }
    }

    /// Admit a task for execution, returning its id immediately.
    ///
    /// Never blocks on I/O: the task is validated, queued and the reactor
    /// is woken. Fails with [`EnqueueError::NotRunning`] outside the
    /// `Running` state and with [`EnqueueError::MaxCapacity`] once queued
    /// plus in-flight tasks reach the configured caps.
    pub fn enqueue(&self, task: RequestTask) -> Result<TaskId, EnqueueError> {
        let state = self.shared.lifecycle.state();
        if state != LifecycleState::Running {
            return Err(EnqueueError::NotRunning { state });
        }

        let id = TaskId::new();
        let capacity =
            self.shared.config.max_concurrent_requests + self.shared.config.max_queue_size;
        {
            let mut queue = self.shared.queue.lock();
            let in_flight = self.shared.in_flight.load(Ordering::Acquire);
            if queue.len() + in_flight >= capacity {
                let queue_len = queue.len();
                drop(queue);
                self.shared.observer.capacity_exceeded(queue_len, in_flight);
                return Err(EnqueueError::MaxCapacity {
                    queue_len,
                    in_flight,
                });
            }
            queue.push_back(QueuedTask { id, task });
            self.shared.queue_len.store(queue.len(), Ordering::Release);
        }
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Drain and shut down.
    ///
    /// Stops admission, waits up to `drain_timeout` (the configured default
    /// when `None`) for queued and in-flight work to finish, then surrenders
    /// whatever remains to each task's `TaskHandler::retry` exactly once and
    /// returns with the processor stopped. Idempotent.
    pub fn stop(&self, drain_timeout: Option<Duration>) -> Result<(), ProcessorError> {
        let timeout = drain_timeout.unwrap_or(self.shared.config.drain_timeout);

        // Starting is a transient window: start() holds its caller until the
        // reactor is running, so waiting it out here cannot take long.
        while self.shared.lifecycle.state() == LifecycleState::Starting {
            thread::yield_now();
        }

        if self.shared.lifecycle.state() == LifecycleState::Stopped {
            return Ok(());
        }

        let _ = self.shared.lifecycle.begin_drain();
        self.shared.wake.notify_one();

        {
            let mut flags = self.shared.drain.lock();
            if !flags.drained && !flags.stopped {
                let _ = self.shared.drain_cv.wait_for(&mut flags, timeout);
            }
        }

        let _ = self.shared.lifecycle.begin_stop();
        self.shared.wake.notify_one();

        let handle = self.reactor.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| ProcessorError::Shutdown {
                message: "reactor thread panicked".to_string(),
            })?,
            None => {
                // Another caller is joining the reactor; wait for it.
                let mut flags = self.shared.drain.lock();
                while !flags.stopped {
                    self.shared.drain_cv.wait(&mut flags);
                }
            }
        }
        Ok(())
    }

    /// Number of queued-but-not-started tasks.
    pub fn queue_len(&self) -> usize {
        self.shared.queue_len.load(Ordering::Acquire)
    }

    /// Number of tasks currently executing.
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.shared.lifecycle.state()
    }
}

fn reactor_main(shared: Arc<Shared>, ready_tx: mpsc::Sender<Result<(), String>>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            shared.lifecycle.abort_start();
            let _ = ready_tx.send(Err(format!("failed to build reactor runtime: {e}")));
            return;
        }
    };

    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, reactor_loop(shared, ready_tx));
}

async fn reactor_loop(shared: Arc<Shared>, ready_tx: mpsc::Sender<Result<(), String>>) {
    if let Err(e) = shared.lifecycle.mark_running() {
        let _ = ready_tx.send(Err(e.to_string()));
        return;
    }
    shared.observer.started();
    let _ = ready_tx.send(Ok(()));
    info!("processor running");

    let env = Rc::new(ExecutionEnv::new(
        shared.config.clone(),
        shared.storage.clone(),
    ));
    let registry: Rc<RefCell<HashMap<TaskId, InFlightEntry>>> =
        Rc::new(RefCell::new(HashMap::new()));

    loop {
        let state = shared.lifecycle.state();
        if !matches!(state, LifecycleState::Running | LifecycleState::Draining) {
            break;
        }

        // Move work from the queue into the in-flight set up to the
        // concurrency cap. The counter moves under the queue lock so the
        // queued-plus-in-flight capacity bound holds at every instant.
        while shared.in_flight.load(Ordering::Acquire) < shared.config.max_concurrent_requests {
            let next = {
                let mut queue = shared.queue.lock();
                let item = queue.pop_front();
                if item.is_some() {
                    shared.queue_len.store(queue.len(), Ordering::Release);
                    shared.in_flight.fetch_add(1, Ordering::AcqRel);
                }
                item
            };
            match next {
                Some(QueuedTask { id, task }) => {
                    spawn_task(&env, &shared, &registry, id, task);
                }
                None => break,
            }
        }

        if state == LifecycleState::Draining
            && shared.in_flight.load(Ordering::Acquire) == 0
            && shared.queue_len.load(Ordering::Acquire) == 0
        {
            shared.signal_drained();
        }

        shared.wake.notified().await;
    }

    surrender(&shared, &registry).await;
    env.pool.borrow_mut().clear();
    let _ = shared.lifecycle.mark_stopped();
    shared.observer.stopped();
    shared.signal_stopped();
    info!("processor stopped");
}

fn spawn_task(
    env: &Rc<ExecutionEnv>,
    shared: &Arc<Shared>,
    registry: &Rc<RefCell<HashMap<TaskId, InFlightEntry>>>,
    id: TaskId,
    task: RequestTask,
) {
    let delivered = Arc::new(AtomicBool::new(false));
    let handle = tokio::task::spawn_local({
        let env = env.clone();
        let shared = shared.clone();
        let registry = registry.clone();
        let delivered = delivered.clone();
        let task = task.clone();
        async move {
            run_task(&env, shared.observer.as_ref(), id, &task, &delivered).await;
            registry.borrow_mut().remove(&id);
            shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            shared.wake.notify_one();
        }
    });
    registry.borrow_mut().insert(
        id,
        InFlightEntry {
            task,
            delivered,
            abort: handle.abort_handle(),
        },
    );
}

/// Hand every task that has not reached a terminal delivery to its
/// handler's `retry`, exactly once each, best effort.
async fn surrender(shared: &Arc<Shared>, registry: &Rc<RefCell<HashMap<TaskId, InFlightEntry>>>) {
    let queued: Vec<QueuedTask> = {
        let mut queue = shared.queue.lock();
        let drained = queue.drain(..).collect();
        shared.queue_len.store(0, Ordering::Release);
        drained
    };

    // Abort in-flight sub-tasks before the first await below so none of
    // them can slip in a delivery while the surrender loop runs.
    let in_flight: Vec<InFlightEntry> = {
        let mut registry = registry.borrow_mut();
        registry.drain().map(|(_, entry)| entry).collect()
    };
    for entry in &in_flight {
        entry.abort.abort();
    }

    let surrendered = queued.len() + in_flight.len();
    if surrendered > 0 {
        debug!(count = surrendered, "surrendering unfinished tasks");
    }

    for QueuedTask { task, .. } in queued {
        deliver_retry(shared, task).await;
    }
    for entry in in_flight {
        shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        if !entry.delivered.load(Ordering::Acquire) {
            deliver_retry(shared, entry.task).await;
        }
    }
}

async fn deliver_retry(shared: &Arc<Shared>, task: RequestTask) {
    let handler = task.handler.clone();
    if let Err(e) = handler.retry(task).await {
        error!(error = %e, "retry handler failed during shutdown");
        shared.observer.error("task_retry", &e.to_string());
    }
}
