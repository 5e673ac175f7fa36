//! Admission-controlled priority queue of tasks awaiting a free worker.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use super::error::TaskError;
use super::task::TaskId;

/// A task waiting for dispatch.
#[derive(Debug)]
pub struct QueuedTask<P> {
    /// Task identifier.
    pub id: TaskId,
    /// Discriminator selecting the handler logic.
    pub task_type: String,
    /// Caller-supplied input.
    pub payload: P,
    /// Higher dispatches first.
    pub priority: i32,
    /// Submission sequence number, the FIFO tie-break within a priority.
    pub sequence: u64,
    /// When the task entered the queue.
    pub enqueued_at: Instant,
}

impl<P> QueuedTask<P> {
    /// Create a queue entry stamped with the current instant.
    pub fn new(id: TaskId, task_type: impl Into<String>, payload: P, priority: i32, sequence: u64) -> Self {
        Self {
            id,
            task_type: task_type.into(),
            payload,
            priority,
            sequence,
            enqueued_at: Instant::now(),
        }
    }
}

impl<P> PartialEq for QueuedTask<P> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl<P> Eq for QueuedTask<P> {}

impl<P> PartialOrd for QueuedTask<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for QueuedTask<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (earlier submission).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Bounded queue ordered by `(priority DESC, sequence ASC)`.
///
/// `enqueue` on a full queue fails synchronously instead of waiting.
pub struct TaskQueue<P> {
    capacity: usize,
    tasks: BinaryHeap<QueuedTask<P>>,
}

impl<P> TaskQueue<P> {
    /// Create an empty queue holding at most `capacity` tasks.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tasks: BinaryHeap::with_capacity(capacity.min(1024)),
        }
    }

    /// Admit a task.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::QueueFull` when the queue already holds `capacity` tasks.
    pub fn enqueue(&mut self, task: QueuedTask<P>) -> Result<(), TaskError> {
        if self.is_full() {
            return Err(TaskError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Remove the highest-priority, earliest-submitted task.
    pub fn dequeue(&mut self) -> Option<QueuedTask<P>> {
        self.tasks.pop()
    }

    /// The task `dequeue` would return next.
    #[must_use]
    pub fn peek(&self) -> Option<&QueuedTask<P>> {
        self.tasks.peek()
    }

    /// Remove the task with `id` if it is still waiting. Returns whether it was found.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    /// Remove every queued task, in no particular order.
    pub fn drain(&mut self) -> Vec<QueuedTask<P>> {
        self.tasks.drain().collect()
    }

    /// Number of waiting tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether the next `enqueue` would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    /// Maximum number of waiting tasks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
