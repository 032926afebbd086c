//! In-memory task store with idle expiry.
//!
//! Every `save` restarts the entry's clock. Entries whose clock has run out
//! are hidden from reads straight away and physically evicted by
//! [`InMemoryTaskStore::purge_expired`], which the background sweeper
//! ([`InMemoryTaskStore::run_sweeper`]) calls on a fixed interval.
//!
//! Expiry uses [`tokio::time::Instant`] so tests can drive it with paused
//! time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drawq_core::{Task, TaskId, TaskPredicate};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{StoreError, TaskStore};

struct Entry {
    task: Task,
    /// `None` when the idle window reaches past what `Instant` can hold.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

pub struct InMemoryTaskStore {
    entries: RwLock<HashMap<TaskId, Entry>>,
    /// How long an entry survives without being saved again.
    idle_timeout: Duration,
}

impl InMemoryTaskStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Evict expired entries every `interval` until `cancel` fires.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Task store sweeper started"
        );

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task store sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = self.purge_expired().await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "Task store sweep: evicted idle entries");
                    }
                }
            }
        }
    }

    async fn collect(&self, predicate: Option<&dyn TaskPredicate>) -> Vec<Task> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .filter(|e| predicate.map_or(true, |p| p.test(&e.task)))
            .map(|e| e.task.clone())
            .collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &Task) -> Result<(), StoreError> {
        let entry = Entry {
            task: task.clone(),
            expires_at: Instant::now().checked_add(self.idle_timeout),
        };
        self.entries.write().await.insert(task.id, entry);
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        self.entries.write().await.remove(&id);
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(&id)
            .filter(|e| e.is_live(now))
            .map(|e| e.task.clone()))
    }

    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.collect(None).await)
    }

    async fn list_matching(&self, predicate: &dyn TaskPredicate) -> Result<Vec<Task>, StoreError> {
        Ok(self.collect(Some(predicate)).await)
    }

    async fn find_one(&self, predicate: &dyn TaskPredicate) -> Result<Option<Task>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .values()
            .find(|e| e.is_live(now) && predicate.test(&e.task))
            .map(|e| e.task.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use drawq_core::TaskAction;

    const IDLE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_idle_window() {
        let store = InMemoryTaskStore::new(IDLE);
        let task = Task::new(TaskAction::Imagine);
        store.save(&task).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get(task.id).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get(task.id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn save_refreshes_expiry() {
        let store = InMemoryTaskStore::new(IDLE);
        let task = Task::new(TaskAction::Imagine);
        store.save(&task).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        store.save(&task).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(store.get(task.id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let store = InMemoryTaskStore::new(IDLE);
        let old = Task::new(TaskAction::Imagine);
        store.save(&old).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = Task::new(TaskAction::Imagine);
        store.save(&fresh).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get(fresh.id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_and_stops_on_cancel() {
        let store = Arc::new(InMemoryTaskStore::new(IDLE));
        store.save(&Task::new(TaskAction::Imagine)).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Arc::clone(&store).run_sweeper(Duration::from_secs(10), cancel.clone()),
        );

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(store.entries.read().await.len(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn overwrite_keeps_single_entry() {
        let store = InMemoryTaskStore::new(IDLE);
        let mut task = Task::new(TaskAction::Imagine);
        store.save(&task).await.unwrap();
        task.submit().unwrap();
        store.save(&task).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status(), drawq_core::TaskStatus::Submitted);
    }

    #[tokio::test]
    async fn delete_unknown_is_noop() {
        let store = InMemoryTaskStore::new(IDLE);
        store.delete(Task::new(TaskAction::Imagine).id).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unbounded_idle_window_never_expires() {
        let store = InMemoryTaskStore::new(Duration::MAX);
        let task = Task::new(TaskAction::Imagine);
        store.save(&task).await.unwrap();

        assert!(store.get(task.id).await.unwrap().is_some());
        assert_eq!(store.purge_expired().await, 0);
    }
}
