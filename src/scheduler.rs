//! Task lifecycle facade over the indexed priority queue.

use crate::error::SchedulerError;
use crate::indexed_heap::IndexedPriorityQueue;
use crate::log_dev;
use crate::types::{Priority, Task, TaskId};

/// Single-owner scheduler: tasks go in with `add_task`, come out highest
/// priority first with `get_task`, and can be reprioritized while queued.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: IndexedPriorityQueue,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: IndexedPriorityQueue::with_capacity(capacity),
        }
    }

    /// Submit a task. Fails only if its id is already queued.
    pub fn add_task(&mut self, task: Task) -> Result<(), SchedulerError> {
        self.queue.insert(task)?;
        log_dev!("[SCHED] queued task {} priority={}", task.id, task.priority);
        Ok(())
    }

    /// Reprioritize a queued task.
    pub fn change_task_priority(
        &mut self,
        id: TaskId,
        priority: Priority,
    ) -> Result<(), SchedulerError> {
        let previous = self.queue.update_priority(id, priority)?;
        log_dev!("[SCHED] task {id} priority {previous} -> {priority}");
        Ok(())
    }

    /// Dispatch the highest-priority task.
    pub fn get_task(&mut self) -> Result<Task, SchedulerError> {
        let task = self.queue.extract_max()?;
        log_dev!("[SCHED] dispatched task {} priority={}", task.id, task.priority);
        Ok(task)
    }

    /// Next task `get_task` would return.
    pub fn peek_task(&self) -> Result<&Task, SchedulerError> {
        self.queue.peek()
    }

    /// Withdraw a queued task without dispatching it.
    pub fn cancel_task(&mut self, id: TaskId) -> Result<Task, SchedulerError> {
        let task = self.queue.remove(id)?;
        log_dev!("[SCHED] cancelled task {id}");
        Ok(task)
    }

    pub fn priority_of(&self, id: TaskId) -> Option<Priority> {
        self.queue.get(id).map(|task| task.priority)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.queue.contains(id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Read-only view of the underlying queue.
    pub fn queue(&self) -> &IndexedPriorityQueue {
        &self.queue
    }
}
