use crate::task::TaskStatus;
use crate::types::TaskId;

/// Errors raised by the task model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A status change that would move a task backwards or out of a
    /// terminal state.
    #[error("Invalid status transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}
