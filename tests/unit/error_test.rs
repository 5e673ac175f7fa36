//! Tests for error types

use offload_pool::core::{AppResult, PoolError, TaskError, TaskId, WorkerId};
use std::error::Error;
use std::time::Duration;

#[test]
fn test_queue_full_error() {
    let err = TaskError::QueueFull { capacity: 100 };
    assert_eq!(format!("{err}"), "task queue is full (capacity 100)");
    assert_eq!(err.task_id(), None);
}

#[test]
fn test_timeout_error_carries_task() {
    let task_id = TaskId::new();
    let err = TaskError::Timeout {
        task_id,
        timeout: Duration::from_millis(250),
    };
    assert_eq!(err.task_id(), Some(task_id));
    assert!(err.to_string().contains("timed out after 250ms"));
}

#[test]
fn test_worker_errors_name_the_worker() {
    let err = TaskError::WorkerFault {
        task_id: TaskId::new(),
        worker_id: WorkerId(4),
        reason: "worker thread panicked".into(),
    };
    let text = err.to_string();
    assert!(text.contains("w4"));
    assert!(text.contains("panicked"));
}

#[test]
fn test_handler_error_keeps_source() {
    let err = TaskError::Handler {
        task_id: TaskId::new(),
        source: anyhow::anyhow!("bad encoding"),
    };
    assert!(err.to_string().ends_with("bad encoding"));
    assert!(err.source().is_some());
}

#[test]
fn test_shutdown_and_pool_errors() {
    assert_eq!(TaskError::Shutdown.to_string(), "pool has been shut down");
    let err = PoolError::InvalidConfig("pool_size must be greater than 0".into());
    assert!(err.to_string().contains("pool_size"));
}

#[test]
fn test_task_errors_propagate_into_app_result() {
    fn admit(full: bool) -> AppResult<()> {
        if full {
            Err(TaskError::QueueFull { capacity: 1 })?;
        }
        Ok(())
    }

    assert!(admit(false).is_ok());
    let err = admit(true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::QueueFull { capacity: 1 })
    ));
}
