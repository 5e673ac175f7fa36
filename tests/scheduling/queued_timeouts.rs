//! A queued task whose caller already timed out never reaches a worker.

use offload_pool::core::{TaskError, TaskOptions};
use std::time::Duration;

use crate::priority_dispatch::{single_worker, Recorder, RecorderPool};

#[tokio::test]
async fn test_timed_out_queued_task_is_skipped() {
    let recorder = Recorder::default();
    let pool = RecorderPool::new(single_worker(), recorder.clone()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), pool.wait_ready()).await.unwrap().unwrap();

    let gate = pool.submit("gate", "gate", TaskOptions::new()).unwrap();
    let expired = pool
        .submit(
            "work",
            "expired",
            TaskOptions::new()
                .with_priority(10)
                .with_timeout(Duration::from_millis(50)),
        )
        .unwrap();
    let later = pool.submit("work", "later", TaskOptions::new()).unwrap();

    assert!(matches!(expired.await, Err(TaskError::Timeout { .. })));
    assert_eq!(gate.await.unwrap(), "gate");
    assert_eq!(later.await.unwrap(), "later");

    assert_eq!(*recorder.order.lock(), vec!["gate", "later"]);
    let stats = pool.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.completed, 2);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_timed_out_queued_tasks_release_their_slots() {
    let recorder = Recorder::default();
    let config = single_worker().with_max_queue_size(2);
    let pool = RecorderPool::new(config, recorder.clone()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), pool.wait_ready()).await.unwrap().unwrap();

    let gate = pool.submit("gate", "gate", TaskOptions::new()).unwrap();
    let short = || TaskOptions::new().with_timeout(Duration::from_millis(20));
    let first = pool.submit("work", "first", short()).unwrap();
    let second = pool.submit("work", "second", short()).unwrap();
    assert!(matches!(
        pool.submit("work", "overflow", TaskOptions::new()),
        Err(TaskError::QueueFull { capacity: 2 })
    ));

    assert!(matches!(first.await, Err(TaskError::Timeout { .. })));
    assert!(matches!(second.await, Err(TaskError::Timeout { .. })));

    // Nobody waits on the expired entries, so they no longer count against capacity.
    let stats = pool.stats();
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.pending, 1);
    let admitted = pool
        .submit("work", "admitted", TaskOptions::new())
        .expect("queue should have room once queued tasks time out");

    assert_eq!(gate.await.unwrap(), "gate");
    assert_eq!(admitted.await.unwrap(), "admitted");
    assert_eq!(*recorder.order.lock(), vec!["gate", "admitted"]);
    pool.shutdown().await;
}
