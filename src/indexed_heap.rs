//! Binary max-heap of tasks with an id-to-slot index for in-place reprioritization.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{InvariantViolation, SchedulerError};
use crate::types::{Priority, Task, TaskId};

#[derive(Clone, Copy, Debug)]
struct Entry {
    task: Task,
    /// Arrival order, stamped on insert and kept across priority changes.
    seq: u64,
}

impl Entry {
    /// Higher priority wins; equal priorities dispatch in arrival order.
    fn outranks(&self, other: &Entry) -> bool {
        self.task.priority > other.task.priority
            || (self.task.priority == other.task.priority && self.seq < other.seq)
    }
}

/// Array-backed max-heap whose `position` map always mirrors `storage`.
///
/// Every slot move goes through [`IndexedPriorityQueue::swap`] or
/// [`IndexedPriorityQueue::take_at`], which rewrite the index in the same
/// step, so `position[id] == i` holds exactly when `storage[i]` carries `id`.
#[derive(Debug, Default)]
pub struct IndexedPriorityQueue {
    storage: Vec<Entry>,
    position: HashMap<TaskId, usize>,
    next_seq: u64,
}

impl IndexedPriorityQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with room for `capacity` tasks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Vec::with_capacity(capacity),
            position: HashMap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Whether a task with `id` is currently queued.
    pub fn contains(&self, id: TaskId) -> bool {
        self.position.contains_key(&id)
    }

    /// Look up a queued task by id without disturbing the heap.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.position.get(&id).map(|&index| &self.storage[index].task)
    }

    /// Highest-ranked task, left in place.
    pub fn peek(&self) -> Result<&Task, SchedulerError> {
        self.storage
            .first()
            .map(|entry| &entry.task)
            .ok_or(SchedulerError::Underflow)
    }

    /// Queue a task; an id that is already queued is rejected and the queue
    /// is left unchanged.
    pub fn insert(&mut self, task: Task) -> Result<(), SchedulerError> {
        if self.position.contains_key(&task.id) {
            trace!(id = task.id, "duplicate insert rejected");
            return Err(SchedulerError::DuplicateIdentifier(task.id));
        }
        let index = self.storage.len();
        self.storage.push(Entry {
            task,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        self.position.insert(task.id, index);
        self.sift_up(index);
        trace!(id = task.id, priority = task.priority, len = self.len(), "task queued");
        Ok(())
    }

    /// Remove and return the highest-ranked task.
    pub fn extract_max(&mut self) -> Result<Task, SchedulerError> {
        if self.storage.is_empty() {
            return Err(SchedulerError::Underflow);
        }
        let task = self.take_at(0);
        trace!(id = task.id, priority = task.priority, len = self.len(), "task extracted");
        Ok(task)
    }

    /// Change a queued task's priority in place and return the old value.
    ///
    /// The task is sifted toward the root or the leaves depending on where
    /// the new value places it; an unknown id leaves the heap untouched.
    pub fn update_priority(
        &mut self,
        id: TaskId,
        priority: Priority,
    ) -> Result<Priority, SchedulerError> {
        let index = *self
            .position
            .get(&id)
            .ok_or(SchedulerError::NotFound(id))?;
        let previous = std::mem::replace(&mut self.storage[index].task.priority, priority);
        self.restore(index);
        trace!(id, previous, priority, "task reprioritized");
        Ok(previous)
    }

    /// Cancel a queued task wherever it sits in the heap.
    pub fn remove(&mut self, id: TaskId) -> Result<Task, SchedulerError> {
        let index = *self
            .position
            .get(&id)
            .ok_or(SchedulerError::NotFound(id))?;
        Ok(self.take_at(index))
    }

    /// Drop every queued task.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.position.clear();
    }

    /// Queued tasks in heap-slot order (not dispatch order).
    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.storage.iter().map(|entry| &entry.task)
    }

    /// Audit heap order and the id index against each other.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.position.len() != self.storage.len() {
            return Err(InvariantViolation::IndexSize {
                indexed: self.position.len(),
                stored: self.storage.len(),
            });
        }
        for (index, entry) in self.storage.iter().enumerate() {
            // Equal sizes plus every slot mapping back to itself makes the
            // index a bijection.
            if self.position.get(&entry.task.id) != Some(&index) {
                return Err(InvariantViolation::IndexMismatch {
                    id: entry.task.id,
                    index,
                });
            }
            if index > 0 {
                let parent = Self::parent_of(index);
                if entry.outranks(&self.storage[parent]) {
                    return Err(InvariantViolation::HeapOrder {
                        parent,
                        child: index,
                    });
                }
            }
        }
        Ok(())
    }

    /// Detach the entry at `index`, refilling the slot with the last entry.
    fn take_at(&mut self, index: usize) -> Task {
        let entry = self.storage.swap_remove(index);
        self.position.remove(&entry.task.id);
        if index < self.storage.len() {
            self.position.insert(self.storage[index].task.id, index);
            self.restore(index);
        }
        entry.task
    }

    /// Move the entry at `index` up or down until its neighbours agree with it.
    fn restore(&mut self, index: usize) {
        if index > 0 && self.storage[index].outranks(&self.storage[Self::parent_of(index)]) {
            self.sift_up(index);
        } else {
            self.sift_down(index);
        }
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = Self::parent_of(index);
            if !self.storage[index].outranks(&self.storage[parent]) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.storage.len();
        loop {
            let left = Self::left_child_of(index);
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut best = left;
            if right < len && self.storage[right].outranks(&self.storage[left]) {
                best = right;
            }
            if !self.storage[best].outranks(&self.storage[index]) {
                break;
            }
            self.swap(index, best);
            index = best;
        }
    }

    /// Swap two slots and rewrite both index entries.
    fn swap(&mut self, a: usize, b: usize) {
        self.storage.swap(a, b);
        self.position.insert(self.storage[a].task.id, a);
        self.position.insert(self.storage[b].task.id, b);
    }

    #[inline]
    fn parent_of(index: usize) -> usize {
        (index - 1) / 2
    }

    #[inline]
    fn left_child_of(index: usize) -> usize {
        2 * index + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut IndexedPriorityQueue) -> Vec<Task> {
        let mut out = Vec::new();
        while let Ok(task) = queue.extract_max() {
            queue.validate().expect("heap invalid mid-drain");
            out.push(task);
        }
        out
    }

    #[test]
    fn reference_scenario_dispatches_reprioritized_task() {
        let mut queue = IndexedPriorityQueue::new();
        for id in 1..=5 {
            queue.insert(Task::new(id, id as i64 * 10)).expect("insert");
        }
        assert_eq!(queue.extract_max(), Ok(Task::new(5, 50)));
        assert_eq!(queue.extract_max(), Ok(Task::new(4, 40)));
        assert_eq!(queue.update_priority(1, 100), Ok(10));
        assert_eq!(queue.extract_max(), Ok(Task::new(1, 100)));
        assert_eq!(queue.extract_max(), Ok(Task::new(3, 30)));
        assert_eq!(queue.len(), 1);
        queue.validate().expect("heap invalid");
    }

    #[test]
    fn empty_queue_underflows() {
        let mut queue = IndexedPriorityQueue::new();
        assert_eq!(queue.extract_max(), Err(SchedulerError::Underflow));
        assert_eq!(queue.peek(), Err(SchedulerError::Underflow));
        assert!(queue.is_empty());
    }

    #[test]
    fn unknown_id_update_leaves_heap_untouched() {
        let mut queue = IndexedPriorityQueue::new();
        queue.insert(Task::new(0, 5)).expect("insert");
        queue.insert(Task::new(1, 7)).expect("insert");
        assert_eq!(
            queue.update_priority(42, 100),
            Err(SchedulerError::NotFound(42))
        );
        // A defaulted slot lookup would have rewritten whatever sits in slot 0.
        assert_eq!(queue.get(0), Some(&Task::new(0, 5)));
        assert_eq!(queue.get(1), Some(&Task::new(1, 7)));
        queue.validate().expect("heap invalid");
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut queue = IndexedPriorityQueue::new();
        queue.insert(Task::new(3, 1)).expect("insert");
        assert_eq!(
            queue.insert(Task::new(3, 99)),
            Err(SchedulerError::DuplicateIdentifier(3))
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek(), Ok(&Task::new(3, 1)));
    }

    #[test]
    fn equal_priorities_dispatch_in_arrival_order() {
        let mut queue = IndexedPriorityQueue::new();
        for id in [9, 4, 7, 1, 8] {
            queue.insert(Task::new(id, 5)).expect("insert");
        }
        let order: Vec<TaskId> = drain(&mut queue).iter().map(|task| task.id).collect();
        assert_eq!(order, vec![9, 4, 7, 1, 8]);
    }

    #[test]
    fn update_keeps_arrival_order_among_ties() {
        let mut queue = IndexedPriorityQueue::new();
        queue.insert(Task::new(1, 10)).expect("insert");
        queue.insert(Task::new(2, 0)).expect("insert");
        queue.insert(Task::new(3, 10)).expect("insert");
        // Task 2 joins the tie but arrived before task 3.
        queue.update_priority(2, 10).expect("update");
        let order: Vec<TaskId> = drain(&mut queue).iter().map(|task| task.id).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn update_moves_in_both_directions() {
        let mut queue = IndexedPriorityQueue::new();
        for id in 0..16 {
            queue.insert(Task::new(id, id as i64)).expect("insert");
        }
        // Root drops to the bottom, a leaf jumps to the top.
        queue.update_priority(15, -1).expect("update down");
        queue.validate().expect("heap invalid after decrease");
        queue.update_priority(0, 1_000).expect("update up");
        queue.validate().expect("heap invalid after increase");

        let drained = drain(&mut queue);
        assert_eq!(drained.first(), Some(&Task::new(0, 1_000)));
        assert_eq!(drained.last(), Some(&Task::new(15, -1)));
        assert!(drained.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn remove_from_any_slot_keeps_invariants() {
        for victim in 0..12 {
            let mut queue = IndexedPriorityQueue::new();
            for id in 0..12 {
                queue.insert(Task::new(id, (id as i64 * 7) % 5)).expect("insert");
            }
            let removed = queue.remove(victim).expect("remove");
            assert_eq!(removed.id, victim);
            assert!(!queue.contains(victim));
            queue.validate().expect("heap invalid after remove");
            assert_eq!(drain(&mut queue).len(), 11);
        }
    }

    #[test]
    fn remove_unknown_id_reports_not_found() {
        let mut queue = IndexedPriorityQueue::new();
        assert_eq!(queue.remove(1), Err(SchedulerError::NotFound(1)));
    }

    #[test]
    fn dispatched_id_can_be_queued_again() {
        let mut queue = IndexedPriorityQueue::new();
        queue.insert(Task::new(1, 1)).expect("insert");
        queue.extract_max().expect("extract");
        queue.insert(Task::new(1, 2)).expect("reinsert");
        assert_eq!(queue.peek(), Ok(&Task::new(1, 2)));
    }

    #[test]
    fn negative_priorities_order_correctly() {
        let mut queue = IndexedPriorityQueue::new();
        for (id, priority) in [(1, -5), (2, i64::MIN), (3, 0), (4, i64::MAX), (5, -1)] {
            queue.insert(Task::new(id, priority)).expect("insert");
        }
        let order: Vec<TaskId> = drain(&mut queue).iter().map(|task| task.id).collect();
        assert_eq!(order, vec![4, 3, 5, 1, 2]);
    }

    #[test]
    fn clear_empties_queue_and_index() {
        let mut queue = IndexedPriorityQueue::with_capacity(4);
        for id in 0..4 {
            queue.insert(Task::new(id, 1)).expect("insert");
        }
        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.contains(2));
        assert_eq!(queue.iter().count(), 0);
        queue.validate().expect("heap invalid after clear");
    }

    #[test]
    fn validate_detects_stale_index() {
        let mut queue = IndexedPriorityQueue::new();
        queue.insert(Task::new(1, 1)).expect("insert");
        queue.insert(Task::new(2, 2)).expect("insert");
        // Simulate a swap that forgot to update the index.
        queue.storage.swap(0, 1);
        assert!(matches!(
            queue.validate(),
            Err(InvariantViolation::IndexMismatch { .. })
        ));
    }

    #[test]
    fn validate_detects_heap_order_violation() {
        let mut queue = IndexedPriorityQueue::new();
        queue.insert(Task::new(1, 5)).expect("insert");
        queue.insert(Task::new(2, 1)).expect("insert");
        queue.storage[1].task.priority = 50;
        assert_eq!(
            queue.validate(),
            Err(InvariantViolation::HeapOrder { parent: 0, child: 1 })
        );
    }
}
