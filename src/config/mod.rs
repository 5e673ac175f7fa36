//! Configuration models for pools, timeouts and health thresholds.

pub mod pool;

pub use pool::{SchedulerConfig, WorkerPoolConfig, ENV_PREFIX};
