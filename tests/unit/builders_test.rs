//! Tests for builder modules

use async_trait::async_trait;
use offload_pool::builders::{build_pools, PoolBuilder};
use offload_pool::config::{SchedulerConfig, WorkerPoolConfig};
use offload_pool::core::{PoolError, TaskContext, TaskHandler, TaskOptions, WorkerPool};
use std::collections::HashMap;

#[derive(Clone)]
struct Suffix(String);

#[async_trait]
impl TaskHandler<String, String> for Suffix {
    async fn handle(&self, _task_type: &str, payload: String, _ctx: TaskContext) -> anyhow::Result<String> {
        Ok(format!("{payload}{}", self.0))
    }
}

type SuffixPools = HashMap<String, WorkerPool<String, String, Suffix>>;

#[test]
fn test_pool_builder_names_the_pool() {
    let builder = PoolBuilder::new("thumbnails", WorkerPoolConfig::new().with_pool_size(2));
    assert_eq!(builder.name(), "thumbnails");
    assert_eq!(builder.config().name, "thumbnails");
    assert_eq!(builder.config().pool_size, 2);
}

#[tokio::test]
async fn test_build_pools_one_handler_per_pool() {
    let mut pools = HashMap::new();
    pools.insert("left".to_string(), WorkerPoolConfig::new().with_pool_size(1));
    pools.insert("right".to_string(), WorkerPoolConfig::new().with_pool_size(1));
    let cfg = SchedulerConfig { pools };

    let pools: SuffixPools = build_pools(&cfg, |name, _cfg| Suffix(format!("@{name}"))).unwrap();
    assert_eq!(pools.len(), 2);

    let out = pools["left"].run("tag", "doc".to_string(), TaskOptions::new()).await.unwrap();
    assert_eq!(out, "doc@left");
    assert_eq!(pools["right"].config().name, "right");

    for pool in pools.values() {
        pool.shutdown().await;
    }
}

#[tokio::test]
async fn test_build_pools_rejects_invalid_config() {
    let cfg = SchedulerConfig { pools: HashMap::new() };
    let result: Result<SuffixPools, PoolError> = build_pools(&cfg, |_, _| Suffix(String::new()));
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}
