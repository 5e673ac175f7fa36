//! # Offload Pool
//!
//! A bounded pool of worker threads for running CPU-heavy or blocking tasks
//! (document parsing, text extraction, scoring) off the caller's async runtime.
//!
//! Callers submit typed tasks and get a future that settles exactly once with
//! the result, a timeout, or a classified failure. The pool keeps a fixed
//! number of workers alive, queues work by priority when all workers are busy,
//! rejects work when the queue is full, and replaces workers that crash, hang,
//! or outlive their configured lifetime.
//!
//! ## Key Features
//!
//! - **Priority queue with backpressure**: `(priority DESC, submission ASC)`
//!   ordering and synchronous `QueueFull` rejection
//! - **Per-task timeouts**: the caller is released at the deadline while the
//!   worker keeps running; its late result is discarded
//! - **Fault isolation**: a panicking handler rejects only its own task, and the
//!   worker is replaced
//! - **Health monitor**: stuck and aged workers are terminated and replaced on
//!   a fixed period, with an optional renewable per-worker watchdog
//! - **Metrics**: periodic [`core::PoolStats`] snapshots through a pluggable
//!   [`core::MetricsSink`]
//!
//! ```rust,ignore
//! use offload_pool::config::WorkerPoolConfig;
//! use offload_pool::core::{TaskContext, TaskHandler, TaskOptions, WorkerPool};
//!
//! #[derive(Clone)]
//! struct WordCount;
//!
//! #[async_trait::async_trait]
//! impl TaskHandler<String, usize> for WordCount {
//!     async fn handle(&self, _task_type: &str, text: String, ctx: TaskContext) -> anyhow::Result<usize> {
//!         ctx.report_progress(0.5, "counting");
//!         Ok(text.split_whitespace().count())
//!     }
//! }
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_pool_size(2), WordCount)?;
//! pool.wait_ready().await?;
//! let words = pool.run("count", "a b c".into(), TaskOptions::new()).await?;
//! pool.shutdown().await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Pool manager, task queue, worker protocol, health and metrics.
pub mod core;
/// Configuration models for pools, timeouts and health thresholds.
pub mod config;
/// Builders to construct pools from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
