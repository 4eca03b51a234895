//! Shared identifiers and task model used across the scheduler.

/// Caller-assigned identifier, unique among currently queued tasks.
pub type TaskId = u64;
/// Signed priority; larger values are dispatched first.
pub type Priority = i64;

/// Unit of work ordered by priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Task {
    /// Stable identifier used to look the task up while it is queued.
    pub id: TaskId,
    /// Current priority; may change while the task is queued.
    pub priority: Priority,
}

impl Task {
    /// Construct a new task with the provided id and priority.
    pub fn new(id: TaskId, priority: Priority) -> Self {
        Self { id, priority }
    }
}
