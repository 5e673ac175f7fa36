//! Tests for configuration validation and loading

use offload_pool::config::{SchedulerConfig, WorkerPoolConfig};
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_defaults_are_valid() {
    let cfg = WorkerPoolConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_queue_size, 100);
    assert_eq!(cfg.stuck_task_threshold(), Duration::from_secs(300));
    assert_eq!(cfg.max_worker_age(), Duration::from_secs(3600));
    assert_eq!(cfg.health_check_interval(), Duration::from_secs(30));
    assert_eq!(cfg.metrics_interval(), Duration::from_secs(60));
    assert_eq!(cfg.worker_timeout(), None);
    assert_eq!(cfg.default_task_timeout(), None);
    assert!(cfg.pool_size >= 1);
}

#[test]
fn test_builder_methods() {
    let cfg = WorkerPoolConfig::new()
        .with_name("ocr")
        .with_pool_size(3)
        .with_max_queue_size(7)
        .with_default_task_timeout(Duration::from_secs(2))
        .with_worker_timeout(Duration::from_millis(500));
    assert_eq!(cfg.name, "ocr");
    assert_eq!(cfg.pool_size, 3);
    assert_eq!(cfg.max_queue_size, 7);
    assert_eq!(cfg.default_task_timeout(), Some(Duration::from_secs(2)));
    assert_eq!(cfg.worker_timeout_ms, Some(500));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_invalid_sizes() {
    assert!(WorkerPoolConfig::new().with_pool_size(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_max_queue_size(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_thread_stack_size(1024).validate().is_err());
}

#[test]
fn test_invalid_timeouts() {
    assert!(WorkerPoolConfig::new()
        .with_default_task_timeout(Duration::ZERO)
        .validate()
        .is_err());
    assert!(WorkerPoolConfig::new()
        .with_health_check_interval(Duration::ZERO)
        .validate()
        .is_err());

    let err = WorkerPoolConfig::new()
        .with_worker_timeout(Duration::from_secs(10))
        .with_stuck_task_threshold(Duration::from_secs(5))
        .validate()
        .unwrap_err();
    assert!(err.contains("worker_timeout_ms"));
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = WorkerPoolConfig::from_json_str(r#"{"name":"pdf","pool_size":2,"worker_timeout_ms":1000}"#)
        .unwrap();
    assert_eq!(cfg.name, "pdf");
    assert_eq!(cfg.pool_size, 2);
    assert_eq!(cfg.worker_timeout(), Some(Duration::from_secs(1)));
    assert_eq!(cfg.max_queue_size, 100);

    assert!(WorkerPoolConfig::from_json_str(r#"{"pool_size":0}"#).is_err());
    assert!(WorkerPoolConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_from_lookup_reads_prefixed_keys() {
    let vars: HashMap<&str, &str> = [
        ("OFFLOAD_POOL_NAME", "resumes"),
        ("OFFLOAD_POOL_SIZE", "4"),
        ("OFFLOAD_POOL_MAX_QUEUE_SIZE", " 250 "),
        ("OFFLOAD_POOL_DEFAULT_TASK_TIMEOUT_MS", "30000"),
    ]
    .into_iter()
    .collect();

    let cfg = WorkerPoolConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
    assert_eq!(cfg.name, "resumes");
    assert_eq!(cfg.pool_size, 4);
    assert_eq!(cfg.max_queue_size, 250);
    assert_eq!(cfg.default_task_timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn test_from_lookup_reports_bad_values() {
    let err = WorkerPoolConfig::from_lookup(|key| {
        (key == "OFFLOAD_POOL_SIZE").then(|| "many".to_string())
    })
    .unwrap_err();
    assert!(err.starts_with("OFFLOAD_POOL_SIZE"));
}

#[test]
fn test_scheduler_config_validation() {
    let mut pools = HashMap::new();
    pools.insert("parse".to_string(), WorkerPoolConfig::new().with_pool_size(2));
    let cfg = SchedulerConfig { pools };
    assert!(cfg.validate().is_ok());

    let empty = SchedulerConfig { pools: HashMap::new() };
    assert!(empty.validate().is_err());

    let mut pools = HashMap::new();
    pools.insert("broken".to_string(), WorkerPoolConfig::new().with_pool_size(0));
    let err = SchedulerConfig { pools }.validate().unwrap_err();
    assert!(err.contains("broken"));
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{"pools":{"extract":{"pool_size":2},"score":{"pool_size":1,"max_queue_size":5}}}"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.pools.len(), 2);
    assert_eq!(cfg.pools["score"].max_queue_size, 5);
}
