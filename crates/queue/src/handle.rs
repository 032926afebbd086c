use drawq_core::TaskId;
use tokio_util::sync::CancellationToken;

/// Cancellable handle to an admitted task's execution.
///
/// Cancelling a task that is still queued keeps it from ever starting;
/// cancelling a running task stops its worker at the next suspension point.
/// Either way the task keeps the status it last persisted.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task_id: TaskId,
    cancel: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(task_id: TaskId, cancel: CancellationToken) -> Self {
        Self { task_id, cancel }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the task has been cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}
