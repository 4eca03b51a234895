//! Priority task scheduler built on an indexed binary max-heap.
//!
//! [`Scheduler`] hands out the highest-priority queued task and lets callers
//! reprioritize queued tasks by id in O(log n). [`SharedScheduler`] wraps it
//! behind a single lock for multi-threaded producers and consumers.

pub mod error;
pub mod indexed_heap;
pub mod logging;
pub mod scheduler;
pub mod shared;
pub mod sim;
pub mod types;

pub use error::{InvariantViolation, SchedulerError};
pub use indexed_heap::IndexedPriorityQueue;
pub use scheduler::Scheduler;
pub use shared::SharedScheduler;
pub use types::{Priority, Task, TaskId};
