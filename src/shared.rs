//! Thread-safe scheduler with blocking and non-blocking consumers.

use std::sync::{Condvar, Mutex};

use crate::error::{InvariantViolation, SchedulerError};
use crate::scheduler::Scheduler;
use crate::types::{Priority, Task, TaskId};

/// A scheduler behind one lock, shared by producers, consumers and
/// reprioritizers.
pub struct SharedScheduler {
    inner: Mutex<SharedState>,
    available: Condvar,
}

struct SharedState {
    scheduler: Scheduler,
    closed: bool,
}

impl SharedScheduler {
    /// Create an empty, open scheduler.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SharedState {
                scheduler: Scheduler::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Submit a task; fails once the scheduler is closed or on a duplicate id.
    pub fn push(&self, task: Task) -> Result<(), SchedulerError> {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        if guard.closed {
            return Err(SchedulerError::Closed);
        }
        guard.scheduler.add_task(task)?;
        self.available.notify_one();
        Ok(())
    }

    /// Try to take the highest-priority task without blocking.
    pub fn try_pop(&self) -> Option<Task> {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard.scheduler.get_task().ok()
    }

    /// Block until a task is available or the scheduler is closed and drained.
    pub fn pop_blocking_or_closed(&self) -> Option<Task> {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        loop {
            if let Ok(task) = guard.scheduler.get_task() {
                return Some(task);
            }
            if guard.closed {
                return None;
            }
            // Wait releases the lock and re-acquires it before returning.
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Reprioritize a task that has not been dispatched yet.
    pub fn change_priority(&self, id: TaskId, priority: Priority) -> Result<(), SchedulerError> {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard.scheduler.change_task_priority(id, priority)
    }

    /// Withdraw a task that has not been dispatched yet.
    pub fn cancel(&self, id: TaskId) -> Result<Task, SchedulerError> {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard.scheduler.cancel_task(id)
    }

    /// Stop accepting tasks and wake all blocked consumers. Queued tasks can
    /// still be drained.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard.closed = true;
        self.available.notify_all();
    }

    /// Current number of queued tasks.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard.scheduler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Audit the queue under the lock.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard.scheduler.queue().validate()
    }
}

impl Default for SharedScheduler {
    fn default() -> Self {
        Self::new()
    }
}
