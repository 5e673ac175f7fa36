//! Pool statistics and periodic metrics reporting.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Read-only snapshot of pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    /// Tasks that settled with a handler result.
    pub completed: u64,
    /// Tasks that settled with a handler error, worker fault or unhealthy-worker error.
    pub errored: u64,
    /// Tasks rejected by their caller-visible timeout.
    pub timed_out: u64,
    /// Submissions rejected at admission.
    pub rejected: u64,
    /// Submissions admitted.
    pub submitted: u64,
    /// Mean dispatch-to-settle time over completed and errored tasks.
    pub avg_processing_time_ms: f64,
    /// Live worker handles, including ones still starting.
    pub pool_size: usize,
    /// Configured number of workers.
    pub configured_size: usize,
    /// Ready workers in the free set.
    pub free_count: usize,
    /// Workers executing a task.
    pub busy_count: usize,
    /// Tasks waiting for a worker.
    pub queue_length: usize,
    /// Tasks whose caller is still waiting (queued or dispatched).
    pub pending: usize,
    /// Workers terminated and replaced after a fault, watchdog or health check.
    pub workers_replaced: u64,
}

/// Counters mutated only by the coordinator.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub completed: u64,
    pub errored: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub submitted: u64,
    pub workers_replaced: u64,
    total_processing: Duration,
}

impl PoolCounters {
    pub fn record_completed(&mut self, elapsed: Duration) {
        self.completed += 1;
        self.total_processing += elapsed;
    }

    pub fn record_errored(&mut self, elapsed: Duration) {
        self.errored += 1;
        self.total_processing += elapsed;
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn avg_processing_time_ms(&self) -> f64 {
        let settled = self.completed + self.errored;
        if settled == 0 {
            return 0.0;
        }
        self.total_processing.as_secs_f64() * 1000.0 / settled as f64
    }
}

/// Destination for periodic pool statistics.
pub trait MetricsSink: Send + Sync {
    /// Record one snapshot for the named pool.
    fn report(&self, pool: &str, stats: &PoolStats);
}

/// Emits each snapshot as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn report(&self, pool: &str, stats: &PoolStats) {
        tracing::info!(
            target: "offload_pool::metrics",
            pool = pool,
            completed = stats.completed,
            errored = stats.errored,
            timed_out = stats.timed_out,
            rejected = stats.rejected,
            avg_processing_time_ms = stats.avg_processing_time_ms,
            pool_size = stats.pool_size,
            free = stats.free_count,
            busy = stats.busy_count,
            queue_length = stats.queue_length,
            workers_replaced = stats.workers_replaced,
            "pool metrics"
        );
    }
}

/// Keeps the most recent snapshots in a bounded buffer.
pub struct InMemoryMetricsSink {
    snapshots: Mutex<VecDeque<(String, PoolStats)>>,
    max_snapshots: usize,
}

impl InMemoryMetricsSink {
    /// Create a sink retaining at most `max_snapshots` entries.
    #[must_use]
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::with_capacity(max_snapshots)),
            max_snapshots,
        }
    }

    /// Copy of the retained snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<(String, PoolStats)> {
        self.snapshots.lock().iter().cloned().collect()
    }

    /// Most recent snapshot, if any.
    pub fn latest(&self) -> Option<PoolStats> {
        self.snapshots.lock().back().map(|(_, stats)| stats.clone())
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn report(&self, pool: &str, stats: &PoolStats) {
        let mut snapshots = self.snapshots.lock();
        if snapshots.len() >= self.max_snapshots {
            snapshots.pop_front();
        }
        snapshots.push_back((pool.to_string(), stats.clone()));
    }
}
