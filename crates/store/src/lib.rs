//! Task persistence.
//!
//! [`TaskStore`] is the seam the queue writes task snapshots through.
//! [`InMemoryTaskStore`] keeps snapshots in memory and forgets any entry
//! that has not been saved again within its idle window.

pub mod memory;

use async_trait::async_trait;
use drawq_core::{Task, TaskId, TaskPredicate};

pub use memory::InMemoryTaskStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing storage rejected or failed the operation.
    #[error("Task store backend error: {0}")]
    Backend(String),
}

/// Snapshot storage keyed by task id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or overwrite the snapshot for `task.id`, refreshing its expiry.
    async fn save(&self, task: &Task) -> Result<(), StoreError>;

    /// Remove the snapshot for `id`. Removing an unknown id is a no-op.
    async fn delete(&self, id: TaskId) -> Result<(), StoreError>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// All live snapshots, in no particular order.
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    async fn list_matching(&self, predicate: &dyn TaskPredicate) -> Result<Vec<Task>, StoreError>;

    async fn find_one(&self, predicate: &dyn TaskPredicate) -> Result<Option<Task>, StoreError>;
}
