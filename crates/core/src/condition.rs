//! Task filters.
//!
//! Store listings and running-set lookups take a `&dyn TaskPredicate`.
//! Any `Fn(&Task) -> bool` closure is a predicate, and [`TaskCondition`]
//! covers the common id / status / action filters.

use std::collections::HashSet;

use crate::task::{Task, TaskAction, TaskStatus};
use crate::types::TaskId;

pub trait TaskPredicate: Send + Sync {
    fn test(&self, task: &Task) -> bool;
}

impl<F> TaskPredicate for F
where
    F: Fn(&Task) -> bool + Send + Sync,
{
    fn test(&self, task: &Task) -> bool {
        self(task)
    }
}

/// Conjunction of optional filters. An empty condition matches every task.
#[derive(Debug, Clone, Default)]
pub struct TaskCondition {
    pub ids: Option<HashSet<TaskId>>,
    pub statuses: Option<HashSet<TaskStatus>>,
    pub actions: Option<HashSet<TaskAction>>,
}

impl TaskCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = TaskAction>) -> Self {
        self.actions = Some(actions.into_iter().collect());
        self
    }
}

impl TaskPredicate for TaskCondition {
    fn test(&self, task: &Task) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&task.id) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status()) {
                return false;
            }
        }
        if let Some(actions) = &self.actions {
            if !actions.contains(&task.action) {
                return false;
            }
        }
        true
    }
}
