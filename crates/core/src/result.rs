//! Return codes, backend replies and submission results.
//!
//! [`ReturnCode`] values are stable numbers that callers match on; they
//! serialize as plain integers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::TaskId;

/// Key of the property carrying the queue depth on an `IN_QUEUE` result.
pub const PROP_NUMBER_OF_QUEUES: &str = "numberOfQueues";

// ---------------------------------------------------------------------------
// ReturnCode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ReturnCode {
    Success,
    NotFound,
    ValidationError,
    Failure,
    Existed,
    InQueue,
    QueueRejected,
    BannedPrompt,
}

impl ReturnCode {
    pub fn code(self) -> i32 {
        match self {
            ReturnCode::Success => 1,
            ReturnCode::NotFound => 3,
            ReturnCode::ValidationError => 4,
            ReturnCode::Failure => 9,
            ReturnCode::Existed => 21,
            ReturnCode::InQueue => 22,
            ReturnCode::QueueRejected => 23,
            ReturnCode::BannedPrompt => 24,
        }
    }
}

impl From<ReturnCode> for i32 {
    fn from(code: ReturnCode) -> Self {
        code.code()
    }
}

impl TryFrom<i32> for ReturnCode {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ReturnCode::Success),
            3 => Ok(ReturnCode::NotFound),
            4 => Ok(ReturnCode::ValidationError),
            9 => Ok(ReturnCode::Failure),
            21 => Ok(ReturnCode::Existed),
            22 => Ok(ReturnCode::InQueue),
            23 => Ok(ReturnCode::QueueRejected),
            24 => Ok(ReturnCode::BannedPrompt),
            other => Err(CoreError::Validation(format!("Unknown return code {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Reply of a backend submission call: a code plus a human-readable
/// description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub code: ReturnCode,
    pub description: String,
}

impl Message {
    pub fn of(code: ReturnCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn success() -> Self {
        Self::of(ReturnCode::Success, "Success")
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self::of(ReturnCode::Failure, description)
    }

    pub fn is_success(&self) -> bool {
        self.code == ReturnCode::Success
    }
}

// ---------------------------------------------------------------------------
// SubmitResult
// ---------------------------------------------------------------------------

/// Outcome of handing a task to the queue.
///
/// Exactly one of: accepted and running ([`ReturnCode::Success`]), accepted
/// and waiting ([`ReturnCode::InQueue`]), rejected because the queue is full
/// ([`ReturnCode::QueueRejected`]), or a generic [`ReturnCode::Failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub code: ReturnCode,
    pub description: String,
    /// Id of the accepted task.
    pub result: Option<TaskId>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl SubmitResult {
    fn of(code: ReturnCode, description: impl Into<String>, result: Option<TaskId>) -> Self {
        Self {
            code,
            description: description.into(),
            result,
            properties: serde_json::Map::new(),
        }
    }

    /// The task took a free worker slot.
    pub fn accepted(task_id: TaskId) -> Self {
        Self::of(ReturnCode::Success, "Submitted successfully", Some(task_id))
    }

    /// The task waits behind `ahead` other queued tasks.
    pub fn queued(task_id: TaskId, ahead: usize) -> Self {
        let mut result = Self::of(
            ReturnCode::InQueue,
            format!("In queue, {ahead} task(s) ahead"),
            Some(task_id),
        );
        result
            .properties
            .insert(PROP_NUMBER_OF_QUEUES.to_string(), serde_json::json!(ahead));
        result
    }

    pub fn rejected() -> Self {
        Self::of(
            ReturnCode::QueueRejected,
            "Queue is full, please try again later",
            None,
        )
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self::of(ReturnCode::Failure, description, None)
    }

    /// `true` when the task was admitted, either running or queued.
    pub fn is_accepted(&self) -> bool {
        matches!(self.code, ReturnCode::Success | ReturnCode::InQueue)
    }

    /// Queue depth reported on an `IN_QUEUE` result.
    pub fn tasks_ahead(&self) -> Option<usize> {
        self.properties
            .get(PROP_NUMBER_OF_QUEUES)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
