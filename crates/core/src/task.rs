//! The draw task record and its lifecycle state machine.
//!
//! A [`Task`] moves forward along
//! `NOT_START -> SUBMITTED -> IN_PROGRESS -> {SUCCESS | FAILURE}`.
//! `IN_PROGRESS` may be reported repeatedly while the backend renders, but a
//! task never returns to an earlier phase and never leaves a terminal state.
//! Every mutating method enforces this and returns
//! [`CoreError::InvalidTransition`] instead of applying an illegal change.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{new_task_id, TaskId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a draw task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStart,
    Submitted,
    InProgress,
    Failure,
    Success,
}

impl TaskStatus {
    /// Position along the lifecycle. Both terminal states share the last
    /// phase.
    fn phase(self) -> u8 {
        match self {
            TaskStatus::NotStart => 0,
            TaskStatus::Submitted => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Failure | TaskStatus::Success => 3,
        }
    }

    /// `true` for `SUCCESS` and `FAILURE`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Failure | TaskStatus::Success)
    }

    /// Whether a task currently in `self` may move to `next`.
    ///
    /// Staying in the same non-terminal phase is allowed (repeated progress
    /// reports); moving backwards or out of a terminal state is not.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.phase() >= self.phase()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStart => "NOT_START",
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The kind of draw operation a task asks the backend to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    Imagine,
    Upscale,
    Variation,
    Reroll,
    Describe,
    Blend,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Progress text reported once the backend has accepted a task.
const PROGRESS_STARTED: &str = "0%";

/// Progress text reported on success.
const PROGRESS_DONE: &str = "100%";

/// A single draw job and everything known about its execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub action: TaskAction,
    pub prompt: Option<String>,
    pub description: Option<String>,
    /// Opaque caller state echoed back in notifications.
    pub state: Option<String>,
    /// Webhook URL that receives every status change, if any.
    pub notify_hook: Option<String>,

    status: TaskStatus,
    pub progress: Option<String>,

    pub submit_time: Timestamp,
    pub start_time: Option<Timestamp>,
    pub finish_time: Option<Timestamp>,

    pub result_url: Option<String>,
    pub fail_reason: Option<String>,

    /// Backend correlation data (nonce, message id, ...).
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Create a task in `NOT_START` with a fresh id.
    pub fn new(action: TaskAction) -> Self {
        Self {
            id: new_task_id(),
            action,
            prompt: None,
            description: None,
            state: None,
            notify_hook: None,
            status: TaskStatus::NotStart,
            progress: None,
            submit_time: Utc::now(),
            start_time: None,
            finish_time: None,
            result_url: None,
            fail_reason: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_notify_hook(mut self, url: impl Into<String>) -> Self {
        self.notify_hook = Some(url.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(key.into(), value);
    }

    /// Record that a worker picked the task up. The status is left untouched
    /// until the backend accepts the submission.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.check(TaskStatus::NotStart)?;
        self.start_time = Some(Utc::now());
        self.progress = Some(PROGRESS_STARTED.to_string());
        Ok(())
    }

    /// The backend accepted the submission.
    pub fn submit(&mut self) -> Result<(), CoreError> {
        self.transition(TaskStatus::Submitted)
    }

    /// The backend reported rendering progress.
    pub fn in_progress(&mut self, progress: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::InProgress)?;
        self.progress = Some(progress.into());
        Ok(())
    }

    /// The backend finished and produced `result_url`.
    pub fn success(&mut self, result_url: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Success)?;
        self.finish_time = Some(Utc::now());
        self.progress = Some(PROGRESS_DONE.to_string());
        self.result_url = Some(result_url.into());
        Ok(())
    }

    /// The task failed for `reason`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Failure)?;
        self.finish_time = Some(Utc::now());
        self.progress = None;
        self.fail_reason = Some(reason.into());
        Ok(())
    }

    fn check(&self, next: TaskStatus) -> Result<(), CoreError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            })
        }
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), CoreError> {
        self.check(next)?;
        self.status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
