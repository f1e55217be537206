//! # Handle to a launched task and its final outcome.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Terminal state of a supervised task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Work finished without error.
    Completed,
    /// Work returned an error or panicked; the failure was reported.
    Failed(TaskError),
    /// Work was cancelled before it finished; nothing was reported.
    Cancelled,
}

impl TaskOutcome {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::Cancelled => "cancelled",
        }
    }
}

/// Handle returned by [`Supervisor::launch`](crate::Supervisor::launch).
///
/// Dropping the handle does not cancel the task. The outcome can be awaited
/// once, via [`TaskHandle::wait`], which consumes the handle.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    name: Arc<str>,
    cancel: CancellationToken,
    outcome: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub(crate) fn new(
        id: u64,
        name: Arc<str>,
        cancel: CancellationToken,
        outcome: oneshot::Receiver<TaskOutcome>,
    ) -> Self {
        Self {
            id,
            name,
            cancel,
            outcome,
        }
    }

    /// Supervisor-assigned id, unique per supervisor.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Display name used in logs and failure reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests cancellation. Idempotent; a no-op once the task has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the task's terminal state.
    ///
    /// If the watcher itself was torn down (runtime shutting down), the task is
    /// reported as [`TaskOutcome::Cancelled`].
    pub async fn wait(self) -> TaskOutcome {
        self.outcome.await.unwrap_or(TaskOutcome::Cancelled)
    }
}
