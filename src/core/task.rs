//! Task identity, submission options and the caller-side completion handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::TaskError;

/// Opaque unique identifier assigned to every submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Progress update emitted by a handler while a task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Completion fraction or percentage, as the handler chooses to report it.
    pub progress: f32,
    /// Human-readable status line.
    pub message: String,
}

/// Callback invoked for each progress update of a task.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Per-submission options.
#[derive(Clone, Default)]
pub struct TaskOptions {
    /// Higher values dispatch first. Defaults to 0.
    pub priority: i32,
    /// Caller-visible settle deadline. Falls back to the pool default when unset.
    pub timeout: Option<Duration>,
    /// Invoked zero or more times before the task settles.
    pub on_progress: Option<ProgressCallback>,
}

impl TaskOptions {
    /// Options with default priority, no timeout and no progress callback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the caller-visible timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a progress callback.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for TaskOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOptions")
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Future returned by `submit`, settling exactly once with the task outcome.
///
/// Dropping the handle does not cancel the task; its outcome is discarded.
#[derive(Debug)]
pub struct TaskHandle<R> {
    task_id: TaskId,
    rx: oneshot::Receiver<Result<R, TaskError>>,
}

impl<R> TaskHandle<R> {
    pub(crate) const fn new(task_id: TaskId, rx: oneshot::Receiver<Result<R, TaskError>>) -> Self {
        Self { task_id, rx }
    }

    /// Identifier assigned to the task at submission.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender only disappears without a value when the pool itself is torn down.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Shutdown)))
    }
}
