//! A task while a worker is executing it.
//!
//! [`LiveTask`] is shared between the worker driving the task and the
//! backend integration reporting on it. Every accepted
//! [`report`](LiveTask::report) pushes a snapshot onto a per-task channel,
//! and the worker consumes those snapshots one by one through
//! [`wait_for_next_status`](LiveTask::wait_for_next_status). Reports are
//! therefore observed in the order they were applied and none are
//! coalesced.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use drawq_core::{CoreError, Task, TaskId, TaskStatus};
use tokio::sync::mpsc;

use crate::error::QueueError;

struct Shared {
    id: TaskId,
    task: Mutex<Task>,
    updates_tx: mpsc::UnboundedSender<Task>,
    updates_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>,
}

/// Cheaply cloneable reference to a running task.
#[derive(Clone)]
pub struct LiveTask {
    shared: Arc<Shared>,
}

impl LiveTask {
    pub fn new(task: Task) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                id: task.id,
                task: Mutex::new(task),
                updates_tx,
                updates_rx: tokio::sync::Mutex::new(updates_rx),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status()
    }

    /// A copy of the task as it is right now.
    pub fn snapshot(&self) -> Task {
        self.lock().clone()
    }

    /// Mutate the task without waking the worker, e.g. to attach
    /// correlation properties.
    pub fn update<R>(&self, f: impl FnOnce(&mut Task) -> R) -> R {
        f(&mut self.lock())
    }

    /// Apply a backend status report and wake the worker.
    ///
    /// `change` is expected to call one of the task's transition methods; if
    /// it fails (for instance the report would move the task backwards) the
    /// error is returned and the worker is not woken.
    pub fn report<F>(&self, change: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Task) -> Result<(), CoreError>,
    {
        let mut task = self.lock();
        change(&mut task)?;
        // Sent under the lock so snapshots enter the channel in apply order.
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.shared.updates_tx.send(task.clone());
        Ok(())
    }

    /// Wait until the backend reports a new status, at most `timeout`.
    ///
    /// Returns the snapshot taken when the report was applied.
    pub async fn wait_for_next_status(&self, timeout: Duration) -> Result<Task, QueueError> {
        let mut updates = self.shared.updates_rx.lock().await;
        match tokio::time::timeout(timeout, updates.recv()).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(QueueError::ChannelClosed(self.shared.id)),
            Err(_) => Err(QueueError::WaitTimeout(timeout)),
        }
    }

    /// The next queued report, if one is already waiting.
    pub(crate) fn try_next_status(&self) -> Option<Task> {
        let mut updates = self.shared.updates_rx.try_lock().ok()?;
        updates.try_recv().ok()
    }

    fn lock(&self) -> MutexGuard<'_, Task> {
        self.shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LiveTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTask")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use drawq_core::TaskAction;

    const WAIT: Duration = Duration::from_secs(30);

    fn live() -> LiveTask {
        let mut task = Task::new(TaskAction::Imagine);
        task.submit().unwrap();
        LiveTask::new(task)
    }

    #[tokio::test]
    async fn report_wakes_waiter_with_snapshot() {
        let task = live();
        let reporter = task.clone();
        tokio::spawn(async move {
            reporter.report(|t| t.in_progress("30%")).unwrap();
        });

        let snapshot = task.wait_for_next_status(WAIT).await.unwrap();
        assert_eq!(snapshot.status(), TaskStatus::InProgress);
        assert_eq!(snapshot.progress.as_deref(), Some("30%"));
    }

    #[tokio::test]
    async fn reports_are_observed_in_order() {
        let task = live();
        task.report(|t| t.in_progress("10%")).unwrap();
        task.report(|t| t.in_progress("60%")).unwrap();
        task.report(|t| t.success("https://cdn.example/x.png")).unwrap();

        let first = task.wait_for_next_status(WAIT).await.unwrap();
        let second = task.wait_for_next_status(WAIT).await.unwrap();
        let third = task.wait_for_next_status(WAIT).await.unwrap();

        assert_eq!(first.progress.as_deref(), Some("10%"));
        assert_eq!(second.progress.as_deref(), Some("60%"));
        assert_eq!(third.status(), TaskStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_without_reports() {
        let task = live();
        let err = task
            .wait_for_next_status(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_matches!(err, QueueError::WaitTimeout(d) if d == Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn update_does_not_wake() {
        let task = live();
        task.update(|t| t.set_property("nonce", serde_json::json!("n-1")));

        assert!(task.wait_for_next_status(Duration::from_secs(1)).await.is_err());
        assert_eq!(
            task.snapshot().property("nonce"),
            Some(&serde_json::json!("n-1"))
        );
    }

    #[test]
    fn try_next_status_drains_without_waiting() {
        let task = live();
        assert!(task.try_next_status().is_none());

        task.report(|t| t.in_progress("20%")).unwrap();
        let queued = task.try_next_status().expect("report should be queued");
        assert_eq!(queued.progress.as_deref(), Some("20%"));
        assert!(task.try_next_status().is_none());
    }

    #[tokio::test]
    async fn rejected_report_is_not_delivered() {
        let task = live();
        task.report(|t| t.fail("backend error")).unwrap();
        assert!(task.report(|t| t.in_progress("50%")).is_err());

        let only = task.wait_for_next_status(WAIT).await.unwrap();
        assert_eq!(only.status(), TaskStatus::Failure);
        assert_eq!(task.status(), TaskStatus::Failure);
    }
}
