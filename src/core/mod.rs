//! Pool manager, task queue, worker protocol, health monitor and metrics.

pub mod error;
pub mod executor;
pub mod health;
pub mod metrics;
pub mod task;
pub mod task_queue;
pub mod worker;
pub mod worker_pool;

pub use error::{AppResult, PoolError, TaskError};
pub use executor::{TaskContext, TaskHandler};
pub use metrics::{InMemoryMetricsSink, MetricsSink, PoolStats, TracingMetricsSink};
pub use task::{Progress, ProgressCallback, TaskHandle, TaskId, TaskOptions};
pub use task_queue::{QueuedTask, TaskQueue};
pub use worker::{TaskEnvelope, WorkerId, WorkerMessage, WorkerState};
pub use worker_pool::WorkerPool;
