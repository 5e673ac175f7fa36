//! Worker handles, the coordinator/worker message protocol, and the worker thread loop.
//!
//! Every worker is a dedicated OS thread with its own single-threaded tokio
//! runtime. The coordinator talks to it only through channels: task envelopes
//! go down a per-worker `crossbeam_channel`, and `WorkerMessage`s come back on
//! the pool-wide event channel tagged with the worker's id.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error};

use super::executor::{TaskContext, TaskHandler};
use super::task::{Progress, TaskId};

/// Identity of one execution unit, distinct from any task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Lifecycle state of a worker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Thread spawned, readiness not yet signalled. Not eligible for dispatch.
    Starting,
    /// Idle and in the free set.
    Ready,
    /// Executing a task.
    Busy,
    /// Termination signalled.
    Terminating,
    /// Removed from all tracking.
    Terminated,
}

/// Coordinator to worker: one unit of work.
#[derive(Debug)]
pub struct TaskEnvelope<P> {
    /// Correlation id echoed back in every reply.
    pub task_id: TaskId,
    /// Handler discriminator.
    pub task_type: String,
    /// Caller payload.
    pub payload: P,
}

/// Worker to coordinator messages.
#[derive(Debug)]
pub enum WorkerMessage<R> {
    /// Sent once after the worker runtime is up.
    Ready,
    /// Zero or more per task.
    Progress {
        /// Task reporting progress.
        task_id: TaskId,
        /// The update.
        progress: Progress,
    },
    /// Terminal message: the handler returned a value.
    Success {
        /// Task that finished.
        task_id: TaskId,
        /// Handler result.
        data: R,
    },
    /// Terminal message: the handler returned an error.
    Error {
        /// Task that failed.
        task_id: TaskId,
        /// Handler error.
        error: anyhow::Error,
    },
    /// The worker thread is exiting. Unexpected when the worker is still tracked.
    Exited {
        /// Whether the thread is unwinding from a panic.
        panicked: bool,
    },
}

/// Everything the coordinator event loop reacts to.
#[derive(Debug)]
pub(crate) enum PoolEvent<R> {
    /// A message from a worker thread.
    Worker {
        worker_id: WorkerId,
        message: WorkerMessage<R>,
    },
    /// A task's caller-visible deadline elapsed.
    TaskTimedOut(TaskId),
    /// A worker watchdog fired.
    WatchdogExpired { worker_id: WorkerId, task_id: TaskId },
}

pub(crate) type EventSender<R> = mpsc::UnboundedSender<PoolEvent<R>>;

/// The coordinator's view of one execution unit.
pub(crate) struct WorkerHandle<P> {
    pub id: WorkerId,
    pub state: WorkerState,
    /// Back-reference only; the task itself lives in the pending table.
    pub current_task: Option<TaskId>,
    pub busy_since: Option<Instant>,
    pub created_at: Instant,
    pub tasks_processed: u64,
    watchdog: Option<AbortHandle>,
    watchdog_deadline: Option<Instant>,
    commands: Option<Sender<TaskEnvelope<P>>>,
    kill: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
}

impl<P> WorkerHandle<P> {
    /// Hand a task to the worker thread. Gives the envelope back if the thread is gone.
    pub fn send(&self, envelope: TaskEnvelope<P>) -> Result<(), TaskEnvelope<P>> {
        match &self.commands {
            Some(tx) => tx.send(envelope).map_err(|e| e.0),
            None => Err(envelope),
        }
    }

    pub fn mark_ready(&mut self) {
        self.state = WorkerState::Ready;
    }

    pub fn mark_busy(&mut self, task_id: TaskId) {
        self.state = WorkerState::Busy;
        self.current_task = Some(task_id);
        self.busy_since = Some(Instant::now());
    }

    /// Return to `Ready`, yielding the task that was bound.
    pub fn mark_idle(&mut self) -> Option<TaskId> {
        self.disarm_watchdog();
        self.state = WorkerState::Ready;
        self.busy_since = None;
        self.tasks_processed += 1;
        self.current_task.take()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// How long the worker has been busy on its current task.
    pub fn busy_for(&self) -> Option<Duration> {
        self.busy_since.map(|since| since.elapsed())
    }

    /// Install a (re)armed watchdog timer, cancelling the previous one.
    pub fn arm_watchdog(&mut self, timer: AbortHandle, deadline: Instant) {
        self.disarm_watchdog();
        self.watchdog = Some(timer);
        self.watchdog_deadline = Some(deadline);
    }

    pub fn disarm_watchdog(&mut self) {
        if let Some(timer) = self.watchdog.take() {
            timer.abort();
        }
        self.watchdog_deadline = None;
    }

    /// Whether a watchdog expiry for `task_id` is current, not a stale timer.
    pub fn watchdog_expired(&self, task_id: TaskId) -> bool {
        self.current_task == Some(task_id)
            && self
                .watchdog_deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Signal the thread to stop and release the command channel.
    ///
    /// Idle workers exit at once; a handler still awaiting is dropped at its
    /// next await point. Returns the thread handle for optional joining.
    pub fn terminate(mut self) -> Option<JoinHandle<()>> {
        self.state = WorkerState::Terminating;
        self.disarm_watchdog();
        let _ = self.kill.send(true);
        self.commands = None;
        self.state = WorkerState::Terminated;
        debug!(worker_id = %self.id, state = ?self.state, tasks_processed = self.tasks_processed, "worker terminated");
        self.thread.take()
    }
}

impl<P> Drop for WorkerHandle<P> {
    fn drop(&mut self) {
        self.disarm_watchdog();
        let _ = self.kill.send(true);
    }
}

/// Spawn a worker thread in `Starting` state.
pub(crate) fn spawn_worker<P, R, H>(
    worker_id: WorkerId,
    handler: H,
    events: EventSender<R>,
    stack_size: usize,
) -> std::io::Result<WorkerHandle<P>>
where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    let (kill_tx, kill_rx) = watch::channel(false);

    let thread = thread::Builder::new()
        .name(format!("offload-worker-{}", worker_id.0))
        .stack_size(stack_size)
        .spawn(move || run_worker(worker_id, &handler, &cmd_rx, kill_rx, &events))?;

    Ok(WorkerHandle {
        id: worker_id,
        state: WorkerState::Starting,
        current_task: None,
        busy_since: None,
        created_at: Instant::now(),
        tasks_processed: 0,
        watchdog: None,
        watchdog_deadline: None,
        commands: Some(cmd_tx),
        kill: kill_tx,
        thread: Some(thread),
    })
}

/// Reports the thread's exit, including exits by panic.
struct ExitGuard<'a, R> {
    worker_id: WorkerId,
    events: &'a EventSender<R>,
}

impl<R> Drop for ExitGuard<'_, R> {
    fn drop(&mut self) {
        let _ = self.events.send(PoolEvent::Worker {
            worker_id: self.worker_id,
            message: WorkerMessage::Exited {
                panicked: thread::panicking(),
            },
        });
    }
}

fn run_worker<P, R, H>(
    worker_id: WorkerId,
    handler: &H,
    commands: &Receiver<TaskEnvelope<P>>,
    mut kill: watch::Receiver<bool>,
    events: &EventSender<R>,
) where
    P: Send + 'static,
    R: Send + 'static,
    H: TaskHandler<P, R>,
{
    let _guard = ExitGuard { worker_id, events };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(worker_id = %worker_id, error = %e, "failed to create worker runtime");
            return;
        }
    };

    if events
        .send(PoolEvent::Worker {
            worker_id,
            message: WorkerMessage::Ready,
        })
        .is_err()
    {
        return;
    }
    debug!(worker_id = %worker_id, "worker ready");

    // Blocks until a task arrives; a dropped sender ends the loop.
    while let Ok(envelope) = commands.recv() {
        if *kill.borrow_and_update() {
            break;
        }
        let TaskEnvelope {
            task_id,
            task_type,
            payload,
        } = envelope;

        let progress_events = events.clone();
        let ctx = TaskContext::new(
            task_id,
            worker_id,
            Arc::new(move |progress| {
                let _ = progress_events.send(PoolEvent::Worker {
                    worker_id,
                    message: WorkerMessage::Progress { task_id, progress },
                });
            }),
        );

        let outcome = rt.block_on(async {
            tokio::select! {
                biased;
                _ = kill.changed() => None,
                result = handler.handle(&task_type, payload, ctx) => Some(result),
            }
        });

        let message = match outcome {
            Some(Ok(data)) => WorkerMessage::Success { task_id, data },
            Some(Err(error)) => WorkerMessage::Error { task_id, error },
            None => {
                debug!(worker_id = %worker_id, task_id = %task_id, "worker killed mid-task");
                break;
            }
        };
        if events.send(PoolEvent::Worker { worker_id, message }).is_err() {
            break;
        }
    }

    debug!(worker_id = %worker_id, "worker thread exiting");
}
