//! Error types for pool construction and task settlement.

use std::time::Duration;

use thiserror::Error;

use super::task::TaskId;
use super::worker::WorkerId;

/// Reasons a submitted task can fail, either at admission or at settlement.
///
/// Every variant is surfaced to the original caller; none are retried inside
/// the pool.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Admission rejected because the queue is at capacity.
    #[error("task queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured maximum queue length.
        capacity: usize,
    },
    /// Caller-visible deadline exceeded. The worker may still be running it.
    #[error("task {task_id} timed out after {timeout:?}")]
    Timeout {
        /// Task that timed out.
        task_id: TaskId,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The execution unit crashed or its channel closed while the task was bound to it.
    #[error("worker {worker_id} faulted while running task {task_id}: {reason}")]
    WorkerFault {
        /// Task bound to the worker at fault time.
        task_id: TaskId,
        /// Worker that faulted.
        worker_id: WorkerId,
        /// Fault description.
        reason: String,
    },
    /// The worker was forcibly terminated by the watchdog or health monitor.
    #[error("worker {worker_id} terminated as unhealthy while running task {task_id}: {reason}")]
    WorkerUnhealthy {
        /// Task bound to the worker at termination time.
        task_id: TaskId,
        /// Worker that was terminated.
        worker_id: WorkerId,
        /// Why the worker was judged unhealthy.
        reason: String,
    },
    /// The task handler reported a failure.
    #[error("task {task_id} failed: {source}")]
    Handler {
        /// Task whose handler failed.
        task_id: TaskId,
        /// Error returned by the handler.
        source: anyhow::Error,
    },
    /// The pool was shut down before the task settled.
    #[error("pool has been shut down")]
    Shutdown,
}

impl TaskError {
    /// Task the error refers to, when one was assigned.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Timeout { task_id, .. }
            | Self::WorkerFault { task_id, .. }
            | Self::WorkerUnhealthy { task_id, .. }
            | Self::Handler { task_id, .. } => Some(*task_id),
            Self::QueueFull { .. } | Self::Shutdown => None,
        }
    }
}

/// Errors raised while constructing a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The pool was created outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        let err = TaskError::QueueFull { capacity: 8 };
        assert_eq!(err.to_string(), "task queue is full (capacity 8)");
        assert!(err.task_id().is_none());
    }

    #[test]
    fn test_handler_error_keeps_source() {
        let task_id = TaskId::new();
        let err = TaskError::Handler {
            task_id,
            source: anyhow::anyhow!("bad resume"),
        };
        assert_eq!(err.task_id(), Some(task_id));
        assert!(err.to_string().ends_with("failed: bad resume"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("bad resume"));
    }

    #[test]
    fn test_timeout_display() {
        let task_id = TaskId::new();
        let err = TaskError::Timeout {
            task_id,
            timeout: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), format!("task {task_id} timed out after 50ms"));
    }
}
