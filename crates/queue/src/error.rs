use std::time::Duration;

use drawq_core::{CoreError, TaskId};
use drawq_store::StoreError;

/// Failures that end a task's execution unexpectedly.
///
/// None of these reach the submitting caller: the worker logs them and
/// marks the task `FAILURE`.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The backend reported nothing within the configured bound.
    #[error("No status reported within {0:?}")]
    WaitTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Status channel closed for task {0}")]
    ChannelClosed(TaskId),

    #[error("Task execution panicked: {0}")]
    Panicked(String),
}
