//! Pool and scheduler configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by [`WorkerPoolConfig::from_env`].
pub const ENV_PREFIX: &str = "OFFLOAD_POOL_";

/// Configuration of one worker pool.
///
/// Durations are stored in milliseconds so the struct maps directly onto JSON
/// and environment variables; the `with_*` builders and accessors use `Duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Pool name used in logs and metrics.
    pub name: String,
    /// Number of worker threads.
    pub pool_size: usize,
    /// Maximum queued tasks before admission is rejected.
    pub max_queue_size: usize,
    /// Timeout applied to tasks submitted without one.
    pub default_task_timeout_ms: Option<u64>,
    /// Renewable per-worker watchdog; `None` disables it.
    pub worker_timeout_ms: Option<u64>,
    /// Busy time on one task after which the health monitor replaces the worker.
    pub stuck_task_threshold_ms: u64,
    /// Maximum lifetime of a worker before it is replaced.
    pub max_worker_age_ms: u64,
    /// Period of the health monitor sweep.
    pub health_check_interval_ms: u64,
    /// Period of the metrics reporter.
    pub metrics_interval_ms: u64,
    /// Per-worker join timeout during shutdown.
    pub shutdown_timeout_ms: u64,
    /// Worker thread stack size in bytes.
    pub thread_stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            pool_size: num_cpus::get(),
            max_queue_size: 100,
            default_task_timeout_ms: None,
            worker_timeout_ms: None,
            stuck_task_threshold_ms: 5 * 60 * 1000,
            max_worker_age_ms: 60 * 60 * 1000,
            health_check_interval_ms: 30_000,
            metrics_interval_ms: 60_000,
            shutdown_timeout_ms: 2_000,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl WorkerPoolConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of workers.
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub const fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the timeout for tasks submitted without one.
    #[must_use]
    pub const fn with_default_task_timeout(mut self, timeout: Duration) -> Self {
        self.default_task_timeout_ms = Some(millis(timeout));
        self
    }

    /// Enable the renewable worker watchdog.
    #[must_use]
    pub const fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout_ms = Some(millis(timeout));
        self
    }

    /// Set the stuck-task threshold of the health monitor.
    #[must_use]
    pub const fn with_stuck_task_threshold(mut self, threshold: Duration) -> Self {
        self.stuck_task_threshold_ms = millis(threshold);
        self
    }

    /// Set the maximum worker lifetime.
    #[must_use]
    pub const fn with_max_worker_age(mut self, age: Duration) -> Self {
        self.max_worker_age_ms = millis(age);
        self
    }

    /// Set the health monitor period.
    #[must_use]
    pub const fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval_ms = millis(interval);
        self
    }

    /// Set the metrics reporter period.
    #[must_use]
    pub const fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval_ms = millis(interval);
        self
    }

    /// Set the per-worker join timeout used by shutdown.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = millis(timeout);
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Timeout for tasks submitted without one.
    #[must_use]
    pub fn default_task_timeout(&self) -> Option<Duration> {
        self.default_task_timeout_ms.map(Duration::from_millis)
    }

    /// Worker watchdog period, if enabled.
    #[must_use]
    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_ms.map(Duration::from_millis)
    }

    /// Stuck-task threshold.
    #[must_use]
    pub const fn stuck_task_threshold(&self) -> Duration {
        Duration::from_millis(self.stuck_task_threshold_ms)
    }

    /// Maximum worker lifetime.
    #[must_use]
    pub const fn max_worker_age(&self) -> Duration {
        Duration::from_millis(self.max_worker_age_ms)
    }

    /// Health monitor period.
    #[must_use]
    pub const fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Metrics reporter period.
    #[must_use]
    pub const fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    /// Per-worker join timeout during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("pool_size must be greater than 0".into());
        }
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than 0".into());
        }
        if self.health_check_interval_ms == 0 {
            return Err("health_check_interval_ms must be greater than 0".into());
        }
        if self.metrics_interval_ms == 0 {
            return Err("metrics_interval_ms must be greater than 0".into());
        }
        if self.stuck_task_threshold_ms == 0 || self.max_worker_age_ms == 0 {
            return Err("health thresholds must be greater than 0".into());
        }
        if self.default_task_timeout_ms == Some(0) || self.worker_timeout_ms == Some(0) {
            return Err("timeouts must be greater than 0 when set".into());
        }
        if let Some(worker_timeout) = self.worker_timeout_ms {
            if self.stuck_task_threshold_ms < worker_timeout {
                return Err(format!(
                    "stuck_task_threshold_ms ({}) must not be below worker_timeout_ms ({worker_timeout})",
                    self.stuck_task_threshold_ms
                ));
            }
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse pool configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `OFFLOAD_POOL_*` environment variables over the defaults.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable variable or a validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (keys include [`ENV_PREFIX`]).
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable value or a validation failure.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse()
                .map_err(|e| format!("{ENV_PREFIX}{key}: {e}"))
        }

        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));
        let mut cfg = Self::default();

        if let Some(name) = get("NAME") {
            cfg.name = name;
        }
        if let Some(raw) = get("SIZE") {
            cfg.pool_size = parse("SIZE", &raw)?;
        }
        if let Some(raw) = get("MAX_QUEUE_SIZE") {
            cfg.max_queue_size = parse("MAX_QUEUE_SIZE", &raw)?;
        }
        if let Some(raw) = get("DEFAULT_TASK_TIMEOUT_MS") {
            cfg.default_task_timeout_ms = Some(parse("DEFAULT_TASK_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = get("WORKER_TIMEOUT_MS") {
            cfg.worker_timeout_ms = Some(parse("WORKER_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = get("STUCK_TASK_THRESHOLD_MS") {
            cfg.stuck_task_threshold_ms = parse("STUCK_TASK_THRESHOLD_MS", &raw)?;
        }
        if let Some(raw) = get("MAX_WORKER_AGE_MS") {
            cfg.max_worker_age_ms = parse("MAX_WORKER_AGE_MS", &raw)?;
        }
        if let Some(raw) = get("HEALTH_CHECK_INTERVAL_MS") {
            cfg.health_check_interval_ms = parse("HEALTH_CHECK_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = get("METRICS_INTERVAL_MS") {
            cfg.metrics_interval_ms = parse("METRICS_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = get("SHUTDOWN_TIMEOUT_MS") {
            cfg.shutdown_timeout_ms = parse("SHUTDOWN_TIMEOUT_MS", &raw)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

/// Root configuration for several independently-configured pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of pool name to configuration.
    pub pools: HashMap<String, WorkerPoolConfig>,
}

impl SchedulerConfig {
    /// Validate all pools and ensure at least one pool exists.
    ///
    /// # Errors
    ///
    /// Returns a description naming the first invalid pool.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
