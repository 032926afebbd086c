//! Post-processing of successful results.
//!
//! After a task reaches `SUCCESS`, the worker hands the snapshot to a
//! [`PostProcessor`] (typically: copy the rendered image to long-term
//! storage). A returned URL replaces the task's `result_url`; an error is
//! logged and the task stays `SUCCESS`.

use async_trait::async_trait;
use drawq_core::Task;

#[derive(Debug, thiserror::Error)]
pub enum PostProcessError {
    #[error("Failed to fetch result: {0}")]
    Fetch(String),

    #[error("Failed to upload result: {0}")]
    Upload(String),
}

#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Process the result of `task`. `Ok(Some(url))` replaces the result URL.
    async fn process(&self, task: &Task) -> Result<Option<String>, PostProcessError>;
}

/// Leaves results where the backend put them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPostProcessor;

#[async_trait]
impl PostProcessor for NoopPostProcessor {
    async fn process(&self, _task: &Task) -> Result<Option<String>, PostProcessError> {
        Ok(None)
    }
}
