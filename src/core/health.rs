//! Health monitor policy: which workers must be forcibly replaced.

use std::fmt;
use std::time::Duration;

use super::task::TaskId;
use super::worker::{WorkerHandle, WorkerId, WorkerState};

/// Thresholds applied on every health sweep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HealthPolicy {
    pub max_worker_age: Duration,
    pub stuck_task_threshold: Duration,
}

/// Why a worker failed its health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Unhealthy {
    /// Older than the maximum lifetime.
    Aged { age: Duration },
    /// Busy on one task past the stuck threshold.
    Stuck { task_id: TaskId, busy_for: Duration },
    /// The renewable per-handle watchdog expired.
    WatchdogExpired { task_id: TaskId },
}

impl fmt::Display for Unhealthy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aged { age } => write!(f, "worker exceeded maximum age ({age:?})"),
            Self::Stuck { task_id, busy_for } => {
                write!(f, "worker stuck on task {task_id} for {busy_for:?}")
            }
            Self::WatchdogExpired { task_id } => {
                write!(f, "watchdog expired while running task {task_id}")
            }
        }
    }
}

impl HealthPolicy {
    /// Judge one worker from its age and, when busy, its current task and busy time.
    pub fn inspect(&self, age: Duration, busy: Option<(TaskId, Duration)>) -> Option<Unhealthy> {
        if let Some((task_id, busy_for)) = busy {
            if busy_for > self.stuck_task_threshold {
                return Some(Unhealthy::Stuck { task_id, busy_for });
            }
        }
        (age > self.max_worker_age).then_some(Unhealthy::Aged { age })
    }

    /// Collect every worker that should be terminated and replaced.
    pub fn sweep<'a, P: 'a>(
        &self,
        workers: impl IntoIterator<Item = &'a WorkerHandle<P>>,
    ) -> Vec<(WorkerId, Unhealthy)> {
        workers
            .into_iter()
            .filter(|w| matches!(w.state, WorkerState::Ready | WorkerState::Busy | WorkerState::Starting))
            .filter_map(|w| {
                let busy = w.current_task.zip(w.busy_for());
                self.inspect(w.age(), busy).map(|reason| (w.id, reason))
            })
            .collect()
    }
}
