//! Scheduler error types.

use thiserror::Error;

use crate::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("queue underflow: no tasks queued")]
    Underflow,

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("duplicate task identifier: {0}")]
    DuplicateIdentifier(TaskId),

    #[error("scheduler closed")]
    Closed,
}

/// Structural corruption detected by `IndexedPriorityQueue::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("heap order broken: slot {child} outranks its parent slot {parent}")]
    HeapOrder { parent: usize, child: usize },

    #[error("index mismatch: task {id} indexed at slot {index}")]
    IndexMismatch { id: TaskId, index: usize },

    #[error("index size mismatch: {indexed} indexed, {stored} stored")]
    IndexSize { indexed: usize, stored: usize },
}
