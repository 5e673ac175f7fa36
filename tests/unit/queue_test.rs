//! Tests for the admission-controlled task queue

use offload_pool::core::{QueuedTask, TaskError, TaskId, TaskQueue};

fn task(priority: i32, sequence: u64) -> QueuedTask<u64> {
    QueuedTask::new(TaskId::new(), "extract", sequence, priority, sequence)
}

#[test]
fn test_negative_priorities_sort_last() {
    let mut queue = TaskQueue::new(8);
    queue.enqueue(task(-5, 0)).unwrap();
    queue.enqueue(task(0, 1)).unwrap();
    queue.enqueue(task(-1, 2)).unwrap();

    let order: Vec<i32> = std::iter::from_fn(|| queue.dequeue()).map(|t| t.priority).collect();
    assert_eq!(order, vec![0, -1, -5]);
}

#[test]
fn test_full_queue_recovers_after_dequeue() {
    let mut queue = TaskQueue::new(1);
    queue.enqueue(task(0, 0)).unwrap();
    assert!(matches!(
        queue.enqueue(task(9, 1)),
        Err(TaskError::QueueFull { capacity: 1 })
    ));
    assert_eq!(queue.dequeue().map(|t| t.payload), Some(0));
    assert!(queue.enqueue(task(9, 2)).is_ok());
    assert_eq!(queue.len(), 1);
}
