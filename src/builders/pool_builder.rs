//! Builders to construct worker pools from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{SchedulerConfig, WorkerPoolConfig};
use crate::core::{MetricsSink, PoolError, TaskHandler, TracingMetricsSink, WorkerPool};

/// Assembles a single [`WorkerPool`] from a named configuration.
pub struct PoolBuilder {
    name: String,
    config: WorkerPoolConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl PoolBuilder {
    /// Start from `config`, naming the pool `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, config: WorkerPoolConfig) -> Self {
        let name = name.into();
        Self {
            config: config.with_name(name.clone()),
            name,
            metrics: Arc::new(TracingMetricsSink),
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the pool will be built with.
    #[must_use]
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Report periodic statistics to `metrics` instead of `tracing`.
    #[must_use]
    pub fn metrics_sink(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Spawn the pool.
    ///
    /// # Errors
    ///
    /// Any [`PoolError`] from [`WorkerPool::with_metrics_sink`].
    pub fn build<P, R, H>(self, handler: H) -> Result<WorkerPool<P, R, H>, PoolError>
    where
        P: Send + 'static,
        R: Send + 'static,
        H: TaskHandler<P, R>,
    {
        WorkerPool::with_metrics_sink(self.config, handler, self.metrics)
    }
}

/// Build one pool per entry of `cfg.pools`, each with its own handler.
///
/// The map key becomes the pool name, overriding any `name` in the entry.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` if the scheduler configuration is
/// invalid, or the first error from pool construction.
pub fn build_pools<P, R, H, F>(
    cfg: &SchedulerConfig,
    handler_factory: F,
) -> Result<HashMap<String, WorkerPool<P, R, H>>, PoolError>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
    F: FnMut(&str, &WorkerPoolConfig) -> H,
{
    build_pools_with_metrics(cfg, handler_factory, Arc::new(TracingMetricsSink))
}

/// Like [`build_pools`], with every pool reporting to `metrics`.
///
/// # Errors
///
/// Same as [`build_pools`].
pub fn build_pools_with_metrics<P, R, H, F>(
    cfg: &SchedulerConfig,
    mut handler_factory: F,
    metrics: Arc<dyn MetricsSink>,
) -> Result<HashMap<String, WorkerPool<P, R, H>>, PoolError>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
    F: FnMut(&str, &WorkerPoolConfig) -> H,
{
    cfg.validate().map_err(PoolError::InvalidConfig)?;

    let mut pools = HashMap::with_capacity(cfg.pools.len());
    for (name, pool_cfg) in &cfg.pools {
        let builder = PoolBuilder::new(name.clone(), pool_cfg.clone())
            .metrics_sink(Arc::clone(&metrics));
        let handler = handler_factory(name, builder.config());
        pools.insert(name.clone(), builder.build(handler)?);
    }

    Ok(pools)
}
