//! Queued tasks dispatch by priority, then in submission order.

use async_trait::async_trait;
use offload_pool::config::WorkerPoolConfig;
use offload_pool::core::{TaskContext, TaskHandler, TaskOptions, WorkerPool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Records the order in which payloads reach a worker.
#[derive(Clone, Default)]
pub struct Recorder {
    pub order: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl TaskHandler<&'static str, &'static str> for Recorder {
    async fn handle(&self, task_type: &str, label: &'static str, _ctx: TaskContext) -> anyhow::Result<&'static str> {
        self.order.lock().push(label);
        if task_type == "gate" {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(label)
    }
}

pub type RecorderPool = WorkerPool<&'static str, &'static str, Recorder>;

pub fn single_worker() -> WorkerPoolConfig {
    WorkerPoolConfig::new()
        .with_name("scheduling")
        .with_pool_size(1)
        .with_max_queue_size(16)
}

#[tokio::test]
async fn test_higher_priority_dispatches_first() {
    let recorder = Recorder::default();
    let pool = RecorderPool::new(single_worker(), recorder.clone()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), pool.wait_ready()).await.unwrap().unwrap();

    let gate = pool.submit("gate", "gate", TaskOptions::new()).unwrap();
    let handles = vec![
        pool.submit("work", "low", TaskOptions::new().with_priority(0)).unwrap(),
        pool.submit("work", "high-1", TaskOptions::new().with_priority(5)).unwrap(),
        pool.submit("work", "high-2", TaskOptions::new().with_priority(5)).unwrap(),
        pool.submit("work", "mid", TaskOptions::new().with_priority(1)).unwrap(),
    ];
    assert_eq!(pool.stats().queue_length, 4);

    gate.await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        *recorder.order.lock(),
        vec!["gate", "high-1", "high-2", "mid", "low"]
    );
    pool.shutdown().await;
}

#[tokio::test]
async fn test_equal_priority_is_fifo() {
    let recorder = Recorder::default();
    let pool = RecorderPool::new(single_worker(), recorder.clone()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), pool.wait_ready()).await.unwrap().unwrap();

    let gate = pool.submit("gate", "gate", TaskOptions::new()).unwrap();
    let labels = ["a", "b", "c", "d"];
    let handles: Vec<_> = labels
        .iter()
        .map(|label| pool.submit("work", *label, TaskOptions::new().with_priority(3)).unwrap())
        .collect();

    gate.await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*recorder.order.lock(), vec!["gate", "a", "b", "c", "d"]);
    pool.shutdown().await;
}
