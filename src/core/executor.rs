//! Task handler trait and the execution context handed to it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::task::{Progress, TaskId};
use super::worker::WorkerId;

/// Business logic run inside a worker for every dispatched task.
///
/// Each worker thread owns its own clone of the handler, so `Clone` plays the
/// role of the worker factory. Handlers may report progress through the
/// context and must eventually return; they are never told about caller-side
/// timeouts.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use offload_pool::core::{TaskContext, TaskHandler};
///
/// #[derive(Clone)]
/// struct ResumeHandler;
///
/// #[async_trait]
/// impl TaskHandler<String, u32> for ResumeHandler {
///     async fn handle(&self, task_type: &str, resume: String, ctx: TaskContext) -> anyhow::Result<u32> {
///         ctx.report_progress(0.5, "scoring keywords");
///         match task_type {
///             "score_resume" => Ok(resume.split_whitespace().count() as u32),
///             other => anyhow::bail!("unknown task type `{other}`"),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler<P, R>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Run one task and return its result or the error to reject the caller with.
    ///
    /// Executes on a dedicated worker thread with its own single-threaded
    /// tokio runtime, so blocking work here does not stall the caller's runtime.
    async fn handle(&self, task_type: &str, payload: P, ctx: TaskContext) -> anyhow::Result<R>;
}

pub(crate) type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

/// Per-task context passed to a handler.
#[derive(Clone)]
pub struct TaskContext {
    task_id: TaskId,
    worker_id: WorkerId,
    progress: ProgressSink,
}

impl TaskContext {
    pub(crate) fn new(task_id: TaskId, worker_id: WorkerId, progress: ProgressSink) -> Self {
        Self {
            task_id,
            worker_id,
            progress,
        }
    }

    /// Task being executed.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Worker executing the task.
    #[must_use]
    pub const fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Send a progress update to the submitter's callback.
    ///
    /// Also renews the worker watchdog when one is configured.
    pub fn report_progress(&self, progress: f32, message: impl Into<String>) {
        (self.progress)(Progress {
            progress,
            message: message.into(),
        });
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("worker_id", &self.worker_id)
            .finish_non_exhaustive()
    }
}
