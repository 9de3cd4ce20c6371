//! Processor lifecycle state machine.

use crate::errors::StateError;
use crate::processor::observer::ProcessorObserver;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle states, in transition order.
///
/// ```text
/// stopped  --start-->     starting
/// starting --ready-->     running
/// running  --stop-->      draining
/// draining --deadline|empty--> stopping
/// stopping --completed--> stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// No reactor; nothing is accepted or executing.
    Stopped = 0,
    /// Reactor is being brought up.
    Starting = 1,
    /// Accepting and executing work.
    Running = 2,
    /// No new admission; in-flight work races the drain deadline.
    Draining = 3,
    /// Remaining work is being surrendered to `TaskHandler::retry`.
    Stopping = 4,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Draining,
            4 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Serialized state machine over a single atomic cell.
///
/// Every transition is a compare-and-swap; an invalid transition fails with
/// [`StateError`] and leaves the cell unchanged. The observer is notified
/// on each successful transition.
pub struct LifecycleManager {
    cell: AtomicU8,
    observer: Arc<dyn ProcessorObserver>,
}

impl LifecycleManager {
    /// Create a manager in the `Stopped` state.
    pub fn new(observer: Arc<dyn ProcessorObserver>) -> Self {
        Self {
            cell: AtomicU8::new(LifecycleState::Stopped as u8),
            observer,
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.cell.load(Ordering::Acquire))
    }

    /// `stopped -> starting`.
    pub fn start(&self) -> Result<(), StateError> {
        self.transition(LifecycleState::Stopped, LifecycleState::Starting)
    }

    /// `starting -> running`.
    pub fn mark_running(&self) -> Result<(), StateError> {
        self.transition(LifecycleState::Starting, LifecycleState::Running)
    }

    /// `running -> draining`.
    pub fn begin_drain(&self) -> Result<(), StateError> {
        self.transition(LifecycleState::Running, LifecycleState::Draining)
    }

    /// `draining -> stopping`.
    pub fn begin_stop(&self) -> Result<(), StateError> {
        self.transition(LifecycleState::Draining, LifecycleState::Stopping)
    }

    /// `stopping -> stopped`.
    pub fn mark_stopped(&self) -> Result<(), StateError> {
        self.transition(LifecycleState::Stopping, LifecycleState::Stopped)
    }

    /// Recovery path when the reactor fails to come up: `starting ->
    /// stopped` without entering the drain protocol.
    pub(crate) fn abort_start(&self) {
        let _ = self.cell.compare_exchange(
            LifecycleState::Starting as u8,
            LifecycleState::Stopped as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Whether `enqueue` may admit new work.
    pub fn accepting_new(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Whether queued or in-flight work may still execute.
    pub fn any_work_possible(&self) -> bool {
        matches!(
            self.state(),
            LifecycleState::Running | LifecycleState::Draining
        )
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), StateError> {
        match self.cell.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.observer.state_transition(from, to);
                Ok(())
            }
            Err(actual) => Err(StateError {
                from: LifecycleState::from_u8(actual),
                attempted: to,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::observer::NoopObserver;
    use parking_lot::Mutex;

    fn manager() -> LifecycleManager {
        LifecycleManager::new(Arc::new(NoopObserver))
    }

    #[test]
    fn test_full_lifecycle() {
        let lifecycle = manager();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);

        lifecycle.start().unwrap();
        lifecycle.mark_running().unwrap();
        assert!(lifecycle.accepting_new());
        assert!(lifecycle.any_work_possible());

        lifecycle.begin_drain().unwrap();
        assert!(!lifecycle.accepting_new());
        assert!(lifecycle.any_work_possible());

        lifecycle.begin_stop().unwrap();
        assert!(!lifecycle.any_work_possible());

        lifecycle.mark_stopped().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_invalid_transition_leaves_state_unchanged() {
        let lifecycle = manager();
        let err = lifecycle.begin_drain().unwrap_err();
        assert_eq!(err.from, LifecycleState::Stopped);
        assert_eq!(err.attempted, LifecycleState::Draining);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);

        lifecycle.start().unwrap();
        assert!(lifecycle.start().is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Starting);
    }

    #[test]
    fn test_skipping_drain_is_rejected() {
        let lifecycle = manager();
        lifecycle.start().unwrap();
        lifecycle.mark_running().unwrap();
        assert!(lifecycle.begin_stop().is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Running);
    }

    #[test]
    fn test_observer_sees_transitions() {
        struct Recording(Mutex<Vec<(LifecycleState, LifecycleState)>>);
        impl ProcessorObserver for Recording {
            fn state_transition(&self, from: LifecycleState, to: LifecycleState) {
                self.0.lock().push((from, to));
            }
        }

        let observer = Arc::new(Recording(Mutex::new(Vec::new())));
        let lifecycle = LifecycleManager::new(observer.clone());
        lifecycle.start().unwrap();
        lifecycle.mark_running().unwrap();
        let _ = lifecycle.start(); // invalid, must not notify

        assert_eq!(
            *observer.0.lock(),
            vec![
                (LifecycleState::Stopped, LifecycleState::Starting),
                (LifecycleState::Starting, LifecycleState::Running),
            ]
        );
    }

    #[test]
    fn test_abort_start_recovers_to_stopped() {
        let lifecycle = manager();
        lifecycle.start().unwrap();
        lifecycle.abort_start();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }
}
