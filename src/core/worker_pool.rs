//! Pool manager: admission, dispatch, settlement and worker lifecycle.
//!
//! All coordination state (worker table, free and busy sets, queue, pending
//! table, counters) sits behind one `parking_lot::Mutex`, so admission,
//! dispatch and settlement never interleave. A single coordinator task reacts
//! to worker messages, task timeouts and watchdog expiries, and drives the
//! health monitor and metrics reporter ticks. The lock is never held across an
//! await, and user callbacks run after it is released.
//!
//! # Example
//!
//! ```rust,ignore
//! use offload_pool::config::WorkerPoolConfig;
//! use offload_pool::core::{TaskOptions, WorkerPool};
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new().with_name("resumes").with_pool_size(4),
//!     ResumeHandler,
//! )?;
//! let score = pool
//!     .submit("score_resume", resume_text, TaskOptions::new().with_priority(5))?
//!     .await?;
//! pool.shutdown().await;
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;

use super::error::{PoolError, TaskError};
use super::executor::TaskHandler;
use super::health::{HealthPolicy, Unhealthy};
use super::metrics::{MetricsSink, PoolCounters, PoolStats, TracingMetricsSink};
use super::task::{Progress, ProgressCallback, TaskHandle, TaskId, TaskOptions};
use super::task_queue::{QueuedTask, TaskQueue};
use super::worker::{
    spawn_worker, EventSender, PoolEvent, TaskEnvelope, WorkerHandle, WorkerId, WorkerMessage,
    WorkerState,
};

/// Caller-visible record of a task that has not settled yet.
struct PendingTask<R> {
    sink: oneshot::Sender<Result<R, TaskError>>,
    task_type: String,
    on_progress: Option<ProgressCallback>,
    timeout: Option<Duration>,
    timer: Option<AbortHandle>,
    submitted_at: Instant,
    dispatched_at: Option<Instant>,
    worker: Option<WorkerId>,
}

impl<R> PendingTask<R> {
    fn processing_time(&self) -> Duration {
        self.dispatched_at.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Deliver the outcome. Consuming `self` makes a second settlement impossible.
    fn settle(self, outcome: Result<R, TaskError>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The caller may have dropped its handle; the outcome is then discarded.
        let _ = self.sink.send(outcome);
    }
}

/// Why a tracked worker is being removed outside shutdown.
enum Retirement {
    Fault(String),
    Unhealthy(Unhealthy),
}

struct PoolState<P, R> {
    workers: HashMap<WorkerId, WorkerHandle<P>>,
    free: VecDeque<WorkerId>,
    busy: HashSet<WorkerId>,
    queue: TaskQueue<P>,
    pending: HashMap<TaskId, PendingTask<R>>,
    counters: PoolCounters,
    next_worker_id: u64,
    next_sequence: u64,
    shutting_down: bool,
}

impl<P, R> PoolState<P, R> {
    fn new(max_queue_size: usize) -> Self {
        Self {
            workers: HashMap::new(),
            free: VecDeque::new(),
            busy: HashSet::new(),
            queue: TaskQueue::new(max_queue_size),
            pending: HashMap::new(),
            counters: PoolCounters::default(),
            next_worker_id: 0,
            next_sequence: 0,
            shutting_down: false,
        }
    }

    fn allocate_worker_id(&mut self) -> WorkerId {
        self.next_worker_id += 1;
        WorkerId(self.next_worker_id)
    }

    fn ready_count(&self) -> usize {
        self.free.len() + self.busy.len()
    }

    fn snapshot(&self, configured_size: usize) -> PoolStats {
        PoolStats {
            completed: self.counters.completed,
            errored: self.counters.errored,
            timed_out: self.counters.timed_out,
            rejected: self.counters.rejected,
            submitted: self.counters.submitted,
            avg_processing_time_ms: self.counters.avg_processing_time_ms(),
            pool_size: self.workers.len(),
            configured_size,
            free_count: self.free.len(),
            busy_count: self.busy.len(),
            queue_length: self.queue.len(),
            pending: self.pending.len(),
            workers_replaced: self.counters.workers_replaced,
        }
    }
}

/// Live ready-worker count published to `wait_ready`.
#[derive(Debug, Clone, Copy, Default)]
struct Readiness {
    ready: usize,
    closed: bool,
}

struct PoolInner<P, R, H> {
    config: WorkerPoolConfig,
    handler: H,
    state: Mutex<PoolState<P, R>>,
    events: EventSender<R>,
    runtime: tokio::runtime::Handle,
    ready: watch::Sender<Readiness>,
    stop: Notify,
    metrics: Arc<dyn MetricsSink>,
}

/// Bounded pool of worker threads executing typed tasks out-of-line.
///
/// Construct one per workload and share it (for example behind an `Arc`);
/// several independently-configured pools can coexist.
pub struct WorkerPool<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    inner: Arc<PoolInner<P, R, H>>,
    coordinator: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<P, R, H> WorkerPool<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    /// Create the pool, spawn `config.pool_size` workers and start the coordinator.
    ///
    /// Metrics go to [`TracingMetricsSink`].
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::NoRuntime` when called outside a tokio runtime
    /// - `PoolError::Spawn` if a worker thread cannot be created
    pub fn new(config: WorkerPoolConfig, handler: H) -> Result<Self, PoolError> {
        Self::with_metrics_sink(config, handler, Arc::new(TracingMetricsSink))
    }

    /// Like [`WorkerPool::new`], reporting periodic statistics to `metrics`.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPool::new`].
    pub fn with_metrics_sink(
        config: WorkerPoolConfig,
        handler: H,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        let runtime = tokio::runtime::Handle::try_current()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ready, _) = watch::channel(Readiness::default());
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState::new(config.max_queue_size)),
            config,
            handler,
            events: events_tx,
            runtime,
            ready,
            stop: Notify::new(),
            metrics,
        });

        {
            let mut st = inner.state.lock();
            for _ in 0..inner.config.pool_size {
                let worker_id = st.allocate_worker_id();
                let worker = spawn_worker(
                    worker_id,
                    inner.handler.clone(),
                    inner.events.clone(),
                    inner.config.thread_stack_size,
                )?;
                st.workers.insert(worker_id, worker);
            }
        }

        let coordinator = inner
            .runtime
            .spawn(coordinate(Arc::clone(&inner), events_rx));

        info!(
            pool = %inner.config.name,
            pool_size = inner.config.pool_size,
            max_queue_size = inner.config.max_queue_size,
            "worker pool initialized"
        );

        Ok(Self {
            inner,
            coordinator: Mutex::new(Some(coordinator)),
        })
    }

    /// Admit a task and return a future for its outcome.
    ///
    /// Never blocks beyond bookkeeping: the task is queued and, when a worker
    /// is free, dispatched before this returns.
    ///
    /// # Errors
    ///
    /// - `TaskError::QueueFull` if the queue is at capacity
    /// - `TaskError::Shutdown` if the pool has been shut down
    pub fn submit(
        &self,
        task_type: impl Into<String>,
        payload: P,
        options: TaskOptions,
    ) -> Result<TaskHandle<R>, TaskError> {
        let inner = &self.inner;
        let task_type = task_type.into();
        let mut st = inner.state.lock();
        if st.shutting_down {
            return Err(TaskError::Shutdown);
        }

        let task_id = TaskId::new();
        let sequence = st.next_sequence;
        let queued = QueuedTask::new(task_id, task_type.clone(), payload, options.priority, sequence);
        if let Err(err) = st.queue.enqueue(queued) {
            st.counters.rejected += 1;
            warn!(
                pool = %inner.config.name,
                task_type = %task_type,
                queue_length = st.queue.len(),
                "task rejected: queue full"
            );
            return Err(err);
        }
        st.next_sequence += 1;

        let timeout = options.timeout.or_else(|| inner.config.default_task_timeout());
        let timer = timeout.map(|timeout| inner.arm_task_timeout(task_id, timeout));
        let (sink, rx) = oneshot::channel();
        st.pending.insert(
            task_id,
            PendingTask {
                sink,
                task_type,
                on_progress: options.on_progress,
                timeout,
                timer,
                submitted_at: Instant::now(),
                dispatched_at: None,
                worker: None,
            },
        );
        st.counters.submitted += 1;
        debug!(
            pool = %inner.config.name,
            task_id = %task_id,
            priority = options.priority,
            "task admitted"
        );

        inner.dispatch(&mut st);
        inner.publish_ready(&st);
        Ok(TaskHandle::new(task_id, rx))
    }

    /// Submit a task and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Any [`TaskError`], from admission or settlement.
    pub async fn run(
        &self,
        task_type: impl Into<String>,
        payload: P,
        options: TaskOptions,
    ) -> Result<R, TaskError> {
        self.submit(task_type, payload, options)?.await
    }

    /// Wait until `pool_size` workers have signalled readiness and are live.
    ///
    /// # Errors
    ///
    /// `TaskError::Shutdown` if the pool is, or becomes, shut down first.
    pub async fn wait_ready(&self) -> Result<(), TaskError> {
        let target = self.inner.config.pool_size;
        let mut rx = self.inner.ready.subscribe();
        let closed = rx
            .wait_for(|r| r.closed || r.ready >= target)
            .await
            .map_err(|_| TaskError::Shutdown)?
            .closed;
        if closed {
            Err(TaskError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Snapshot of current statistics. No side effects.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.state.lock().snapshot(self.inner.config.pool_size)
    }

    /// Pool configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.inner.config
    }

    /// Stop accepting work, reject everything pending, and terminate all workers.
    ///
    /// Worker threads are joined with `shutdown_timeout` each; threads that do
    /// not exit in time are detached. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let threads = {
            let mut st = self.inner.state.lock();
            if st.shutting_down {
                return;
            }
            info!(
                pool = %self.inner.config.name,
                pending = st.pending.len(),
                queued = st.queue.len(),
                "shutting down worker pool"
            );
            self.inner.begin_shutdown(&mut st)
        };
        self.inner.stop.notify_one();

        let coordinator = self.coordinator.lock().take();
        if let Some(coordinator) = coordinator {
            if let Err(e) = coordinator.await {
                warn!(pool = %self.inner.config.name, error = %e, "coordinator task ended abnormally");
            }
        }

        let timeout = self.inner.config.shutdown_timeout();
        let worker_count = threads.len();
        for thread in threads {
            join_with_timeout(thread, timeout).await;
        }
        info!(pool = %self.inner.config.name, worker_count, "worker pool shut down");
    }
}

impl<P, R, H> Drop for WorkerPool<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    fn drop(&mut self) {
        // Signal everything but don't join: dropping must not block the runtime.
        {
            let mut st = self.inner.state.lock();
            if !st.shutting_down {
                debug!(pool = %self.inner.config.name, "worker pool dropped without shutdown; detaching workers");
                drop(self.inner.begin_shutdown(&mut st));
            }
        }
        self.inner.stop.notify_one();
    }
}

impl<P, R, H> PoolInner<P, R, H>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    fn publish_ready(&self, st: &PoolState<P, R>) {
        self.ready.send_replace(Readiness {
            ready: st.ready_count(),
            closed: st.shutting_down,
        });
    }

    fn arm_task_timeout(&self, task_id: TaskId, timeout: Duration) -> AbortHandle {
        let events = self.events.clone();
        self.runtime
            .spawn(async move {
                tokio::time::sleep(timeout).await;
                let _ = events.send(PoolEvent::TaskTimedOut(task_id));
            })
            .abort_handle()
    }

    fn arm_watchdog(&self, worker: &mut WorkerHandle<P>, task_id: TaskId) {
        let Some(timeout) = self.config.worker_timeout() else {
            return;
        };
        let events = self.events.clone();
        let worker_id = worker.id;
        let deadline = tokio::time::Instant::now() + timeout;
        let timer = self
            .runtime
            .spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let _ = events.send(PoolEvent::WatchdogExpired { worker_id, task_id });
            })
            .abort_handle();
        worker.arm_watchdog(timer, deadline.into_std());
    }

    fn spawn_into(&self, st: &mut PoolState<P, R>) -> bool {
        let worker_id = st.allocate_worker_id();
        match spawn_worker(
            worker_id,
            self.handler.clone(),
            self.events.clone(),
            self.config.thread_stack_size,
        ) {
            Ok(worker) => {
                st.workers.insert(worker_id, worker);
                debug!(pool = %self.config.name, worker_id = %worker_id, "worker spawned");
                true
            }
            Err(e) => {
                error!(pool = %self.config.name, worker_id = %worker_id, error = %e, "failed to spawn worker");
                false
            }
        }
    }

    /// Pair waiting tasks with free workers until one side runs out.
    fn dispatch(&self, st: &mut PoolState<P, R>) {
        if st.shutting_down {
            return;
        }
        while !st.queue.is_empty() {
            let Some(worker_id) = st.free.pop_front() else {
                break;
            };
            let Some(task) = st.queue.dequeue() else {
                st.free.push_front(worker_id);
                break;
            };
            if !st.pending.contains_key(&task.id) {
                debug!(task_id = %task.id, "skipping task whose caller already timed out");
                st.free.push_front(worker_id);
                continue;
            }
            debug_assert!(st.workers.contains_key(&worker_id), "free set holds an untracked worker");

            let QueuedTask {
                id: task_id,
                task_type,
                payload,
                enqueued_at,
                ..
            } = task;
            let envelope = TaskEnvelope {
                task_id,
                task_type,
                payload,
            };

            let sent = match st.workers.get_mut(&worker_id) {
                Some(worker) => {
                    worker.mark_busy(task_id);
                    let sent = worker.send(envelope).is_ok();
                    if sent {
                        self.arm_watchdog(worker, task_id);
                    }
                    sent
                }
                None => false,
            };

            if sent {
                st.busy.insert(worker_id);
                if let Some(pending) = st.pending.get_mut(&task_id) {
                    pending.dispatched_at = Some(Instant::now());
                    pending.worker = Some(worker_id);
                }
                debug!(
                    pool = %self.config.name,
                    task_id = %task_id,
                    worker_id = %worker_id,
                    waited_ms = enqueued_at.elapsed().as_millis(),
                    "task dispatched"
                );
            } else if let Some(worker) = st.workers.remove(&worker_id) {
                self.retire(st, worker, Retirement::Fault("worker command channel closed".into()));
            }
        }
    }

    /// Remove a worker outside shutdown, reject its bound task, and replace it.
    fn retire(&self, st: &mut PoolState<P, R>, worker: WorkerHandle<P>, retirement: Retirement) {
        let worker_id = worker.id;
        st.free.retain(|id| *id != worker_id);
        st.busy.remove(&worker_id);

        if let Some(task_id) = worker.current_task {
            if let Some(pending) = st.pending.remove(&task_id) {
                let elapsed = pending.processing_time();
                st.counters.record_errored(elapsed);
                let err = match &retirement {
                    Retirement::Fault(reason) => {
                        error!(
                            pool = %self.config.name,
                            task_id = %task_id,
                            worker_id = %worker_id,
                            elapsed_ms = elapsed.as_millis(),
                            reason = %reason,
                            "worker fault; rejecting bound task"
                        );
                        TaskError::WorkerFault {
                            task_id,
                            worker_id,
                            reason: reason.clone(),
                        }
                    }
                    Retirement::Unhealthy(unhealthy) => {
                        warn!(
                            pool = %self.config.name,
                            task_id = %task_id,
                            worker_id = %worker_id,
                            elapsed_ms = elapsed.as_millis(),
                            reason = %unhealthy,
                            "unhealthy worker terminated; rejecting bound task"
                        );
                        TaskError::WorkerUnhealthy {
                            task_id,
                            worker_id,
                            reason: unhealthy.to_string(),
                        }
                    }
                };
                pending.settle(Err(err));
            }
        }

        let never_ready = worker.state == WorkerState::Starting;
        // Forced: a thread stuck in blocking code is detached, not joined.
        drop(worker.terminate());
        st.counters.workers_replaced += 1;

        if st.shutting_down {
            return;
        }
        if never_ready {
            // Respawning at once would spin if startup keeps failing; the health sweep tops up.
            warn!(pool = %self.config.name, worker_id = %worker_id, "worker exited before becoming ready; refill deferred to health check");
            return;
        }
        if self.spawn_into(st) {
            info!(pool = %self.config.name, replaced = %worker_id, "worker replaced");
        }
    }

    /// Mark the pool as shutting down and reject every pending task.
    ///
    /// Returns the worker threads still to be joined.
    fn begin_shutdown(&self, st: &mut PoolState<P, R>) -> Vec<JoinHandle<()>> {
        st.shutting_down = true;
        drop(st.queue.drain());
        for (_, pending) in st.pending.drain() {
            pending.settle(Err(TaskError::Shutdown));
        }
        st.free.clear();
        st.busy.clear();
        let threads = st
            .workers
            .drain()
            .filter_map(|(_, worker)| worker.terminate())
            .collect();
        self.publish_ready(st);
        threads
    }

    fn handle_event(&self, event: PoolEvent<R>) {
        let progress = {
            let mut st = self.state.lock();
            let progress = match event {
                PoolEvent::Worker { worker_id, message } => {
                    self.on_worker_message(&mut st, worker_id, message)
                }
                PoolEvent::TaskTimedOut(task_id) => {
                    Self::on_task_timeout(&mut st, task_id);
                    None
                }
                PoolEvent::WatchdogExpired { worker_id, task_id } => {
                    self.on_watchdog(&mut st, worker_id, task_id);
                    None
                }
            };
            self.publish_ready(&st);
            progress
        };

        if let Some((callback, update)) = progress {
            if catch_unwind(AssertUnwindSafe(|| callback(update))).is_err() {
                warn!(pool = %self.config.name, "progress callback panicked");
            }
        }
    }

    fn on_worker_message(
        &self,
        st: &mut PoolState<P, R>,
        worker_id: WorkerId,
        message: WorkerMessage<R>,
    ) -> Option<(ProgressCallback, Progress)> {
        match message {
            WorkerMessage::Ready => {
                if st.shutting_down {
                    return None;
                }
                let Some(worker) = st.workers.get_mut(&worker_id) else {
                    return None;
                };
                if worker.state == WorkerState::Starting {
                    worker.mark_ready();
                    st.free.push_back(worker_id);
                    debug!(pool = %self.config.name, worker_id = %worker_id, "worker ready");
                    self.dispatch(st);
                }
                None
            }
            WorkerMessage::Progress { task_id, progress } => {
                let worker = st.workers.get_mut(&worker_id)?;
                if worker.current_task != Some(task_id) {
                    return None;
                }
                self.arm_watchdog(worker, task_id);
                let callback = st.pending.get(&task_id)?.on_progress.clone()?;
                Some((callback, progress))
            }
            WorkerMessage::Success { task_id, data } => {
                self.finish_task(st, worker_id, task_id, Ok(data));
                None
            }
            WorkerMessage::Error { task_id, error } => {
                self.finish_task(st, worker_id, task_id, Err(error));
                None
            }
            WorkerMessage::Exited { panicked } => {
                if let Some(worker) = st.workers.remove(&worker_id) {
                    let reason = if panicked {
                        "worker thread panicked"
                    } else {
                        "worker thread exited unexpectedly"
                    };
                    self.retire(st, worker, Retirement::Fault(reason.into()));
                    self.dispatch(st);
                }
                None
            }
        }
    }

    fn finish_task(
        &self,
        st: &mut PoolState<P, R>,
        worker_id: WorkerId,
        task_id: TaskId,
        outcome: anyhow::Result<R>,
    ) {
        match st.workers.get_mut(&worker_id) {
            Some(worker) if worker.current_task == Some(task_id) => {
                worker.mark_idle();
            }
            Some(_) => {
                warn!(worker_id = %worker_id, task_id = %task_id, "completion for a task the worker is not bound to");
                return;
            }
            None => {
                debug!(worker_id = %worker_id, task_id = %task_id, "completion from untracked worker discarded");
                return;
            }
        }
        st.busy.remove(&worker_id);
        st.free.push_back(worker_id);

        match st.pending.remove(&task_id) {
            Some(pending) => {
                let elapsed = pending.processing_time();
                let result = match outcome {
                    Ok(data) => {
                        st.counters.record_completed(elapsed);
                        debug!(
                            task_id = %task_id,
                            worker_id = %worker_id,
                            task_type = %pending.task_type,
                            elapsed_ms = elapsed.as_millis(),
                            "task completed"
                        );
                        Ok(data)
                    }
                    Err(source) => {
                        st.counters.record_errored(elapsed);
                        warn!(
                            task_id = %task_id,
                            worker_id = %worker_id,
                            task_type = %pending.task_type,
                            elapsed_ms = elapsed.as_millis(),
                            error = %source,
                            "task handler failed"
                        );
                        Err(TaskError::Handler { task_id, source })
                    }
                };
                pending.settle(result);
            }
            None => {
                debug!(task_id = %task_id, worker_id = %worker_id, "discarding late result for task no longer awaited");
            }
        }

        self.dispatch(st);
    }

    fn on_task_timeout(st: &mut PoolState<P, R>, task_id: TaskId) {
        let Some(pending) = st.pending.remove(&task_id) else {
            return;
        };
        st.counters.timed_out += 1;
        if pending.worker.is_none() && st.queue.remove(task_id) {
            debug!(task_id = %task_id, "timed-out task removed from queue");
        }
        let timeout = pending.timeout.unwrap_or_default();
        warn!(
            task_id = %task_id,
            worker_id = ?pending.worker,
            elapsed_ms = pending.submitted_at.elapsed().as_millis(),
            "task timed out; any bound worker keeps running it"
        );
        pending.settle(Err(TaskError::Timeout { task_id, timeout }));
    }

    fn on_watchdog(&self, st: &mut PoolState<P, R>, worker_id: WorkerId, task_id: TaskId) {
        let expired = st
            .workers
            .get(&worker_id)
            .is_some_and(|worker| worker.watchdog_expired(task_id));
        if !expired {
            return;
        }
        if let Some(worker) = st.workers.remove(&worker_id) {
            self.retire(st, worker, Retirement::Unhealthy(Unhealthy::WatchdogExpired { task_id }));
            self.dispatch(st);
        }
    }

    /// Health monitor sweep: replace aged or stuck workers and top the pool up.
    fn check_health(&self) {
        let mut st = self.state.lock();
        if st.shutting_down {
            return;
        }
        let policy = HealthPolicy {
            max_worker_age: self.config.max_worker_age(),
            stuck_task_threshold: self.config.stuck_task_threshold(),
        };
        for (worker_id, reason) in policy.sweep(st.workers.values()) {
            if let Some(worker) = st.workers.remove(&worker_id) {
                warn!(pool = %self.config.name, worker_id = %worker_id, reason = %reason, "health check failed");
                self.retire(&mut st, worker, Retirement::Unhealthy(reason));
            }
        }

        let missing = self.config.pool_size.saturating_sub(st.workers.len());
        for _ in 0..missing {
            if !self.spawn_into(&mut st) {
                break;
            }
        }
        self.dispatch(&mut st);
        self.publish_ready(&st);
    }

    fn report_metrics(&self) {
        let stats = self.state.lock().snapshot(self.config.pool_size);
        self.metrics.report(&self.config.name, &stats);
    }
}

/// Coordinator loop: the only place worker messages and timers are consumed.
async fn coordinate<P, R, H>(
    inner: Arc<PoolInner<P, R, H>>,
    mut events: mpsc::UnboundedReceiver<PoolEvent<R>>,
) where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    let start = tokio::time::Instant::now();
    let mut health = tokio::time::interval_at(
        start + inner.config.health_check_interval(),
        inner.config.health_check_interval(),
    );
    health.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut metrics = tokio::time::interval_at(
        start + inner.config.metrics_interval(),
        inner.config.metrics_interval(),
    );
    metrics.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = inner.stop.notified() => break,
            Some(event) = events.recv() => inner.handle_event(event),
            _ = health.tick() => inner.check_health(),
            _ = metrics.tick() => inner.report_metrics(),
        }
    }
    debug!(pool = %inner.config.name, "coordinator stopped");
}

/// Join a worker thread from async code without tying up the runtime.
async fn join_with_timeout(thread: JoinHandle<()>, timeout: Duration) {
    let name = thread.thread().name().unwrap_or("offload-worker").to_string();
    let (tx, rx) = oneshot::channel();
    let helper = thread::Builder::new()
        .name(format!("{name}-join"))
        .spawn(move || {
            let _ = tx.send(thread.join().is_ok());
        });
    if let Err(e) = helper {
        warn!(worker = %name, error = %e, "could not spawn join helper; detaching worker");
        return;
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(true)) => debug!(worker = %name, "worker joined"),
        Ok(Ok(false)) => warn!(worker = %name, "worker panicked"),
        Ok(Err(_)) => warn!(worker = %name, "join helper vanished"),
        Err(_) => warn!(worker = %name, "worker did not exit within timeout; detaching"),
    }
}
