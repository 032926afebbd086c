//! Task admission and execution.
//!
//! [`TaskQueue`] owns a fixed number of worker slots (`core_size`) and a
//! bounded waiting line (`queue_size`). Admission is decided synchronously
//! under a single lock, so the slot count never exceeds `core_size` and the
//! line never grows past `queue_size`; anything beyond that is rejected
//! with `QUEUE_REJECTED` and removed from the store.
//!
//! A slot is a spawned tokio task. It executes the job it was spawned for,
//! then keeps pulling from the waiting line until the line is empty, at
//! which point the slot is released.
//!
//! Each task runs under a child of the queue's [`CancellationToken`]; the
//! per-task [`TaskHandle`] cancels just that task, [`TaskQueue::shutdown`]
//! cancels all of them.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use drawq_core::{CoreError, SubmitResult, Task, TaskId, TaskPredicate, TaskStatus};
use drawq_events::Notifier;
use drawq_store::TaskStore;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::action::SubmitAction;
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::handle::TaskHandle;
use crate::hook::{NoopPostProcessor, PostProcessor};
use crate::live::LiveTask;

/// Reason recorded when a task cannot be admitted because the queue is
/// shutting down.
pub const SHUTTING_DOWN: &str = "Scheduler is shutting down";

/// Reason recorded when execution ends in a timeout, store error or panic.
pub const EXECUTION_FAILED: &str = "Task execution failed, please try again later";

/// Reason returned when the initial store write fails.
const PERSIST_FAILED: &str = "Failed to persist task";

// ---------------------------------------------------------------------------
// Internal bookkeeping
// ---------------------------------------------------------------------------

/// An admitted task together with everything its worker needs.
struct Job {
    task: LiveTask,
    action: SubmitAction,
    handle: TaskHandle,
}

#[derive(Default)]
struct Admission {
    /// Slots currently owned by a worker.
    active: usize,
    pending: VecDeque<Job>,
    closed: bool,
}

enum Admitted {
    Run(Job),
    Queued(usize),
    Rejected,
    Closed(Job),
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

pub struct TaskQueue {
    config: QueueConfig,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    post_processor: Arc<dyn PostProcessor>,
    admission: Mutex<Admission>,
    /// Tasks a worker is currently executing.
    running: RwLock<HashMap<TaskId, LiveTask>>,
    /// Handles of every admitted task, queued or running.
    handles: RwLock<HashMap<TaskId, TaskHandle>>,
    cancel: CancellationToken,
}

impl TaskQueue {
    pub fn new(config: QueueConfig, store: Arc<dyn TaskStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            store,
            notifier,
            post_processor: Arc::new(NoopPostProcessor),
            admission: Mutex::new(Admission::default()),
            running: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Run `post_processor` on every task that reaches `SUCCESS`.
    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = post_processor;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // ----- Admission -----

    /// Persist `task` and try to admit it.
    ///
    /// `action` is invoked exactly once, by the worker that eventually runs
    /// the task. A rejected task is deleted from the store again and its
    /// action is dropped unused.
    pub async fn submit(self: &Arc<Self>, task: Task, action: SubmitAction) -> SubmitResult {
        let task_id = task.id;

        if let Err(e) = self.store.save(&task).await {
            tracing::error!(task_id = %task_id, error = %e, "Failed to persist submitted task");
            return SubmitResult::failure(PERSIST_FAILED);
        }

        let job = Job {
            task: LiveTask::new(task),
            action,
            handle: TaskHandle::new(task_id, self.cancel.child_token()),
        };

        match self.admit(job) {
            Admitted::Run(job) => {
                tracing::debug!(task_id = %task_id, "Task admitted, starting immediately");
                let queue = Arc::clone(self);
                tokio::spawn(async move { queue.work(job).await });
                SubmitResult::accepted(task_id)
            }
            Admitted::Queued(ahead) => {
                tracing::debug!(task_id = %task_id, ahead, "Task admitted, queued");
                SubmitResult::queued(task_id, ahead)
            }
            Admitted::Rejected => {
                tracing::warn!(task_id = %task_id, "Queue is full, task rejected");
                if let Err(e) = self.store.delete(task_id).await {
                    tracing::error!(task_id = %task_id, error = %e, "Failed to delete rejected task");
                }
                SubmitResult::rejected()
            }
            Admitted::Closed(job) => {
                tracing::warn!(task_id = %task_id, "Queue is shut down, task not admitted");
                let failed = job.task.update(|t| t.fail(SHUTTING_DOWN).map(|()| t.clone()));
                match failed {
                    Ok(snapshot) => {
                        if let Err(e) = self.persist_and_notify(&snapshot).await {
                            tracing::error!(task_id = %task_id, error = %e, "Failed to persist refused task");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(task_id = %task_id, error = %e, "Refused task already terminal");
                    }
                }
                SubmitResult::failure(SHUTTING_DOWN)
            }
        }
    }

    fn admit(&self, job: Job) -> Admitted {
        let mut admission = self.admission();
        if admission.closed {
            return Admitted::Closed(job);
        }

        let task_id = job.task.id();
        if admission.active < self.config.core_size {
            admission.active += 1;
            self.handles_mut().insert(task_id, job.handle.clone());
            Admitted::Run(job)
        } else if admission.pending.len() < self.config.queue_size {
            self.handles_mut().insert(task_id, job.handle.clone());
            admission.pending.push_back(job);
            Admitted::Queued(admission.pending.len())
        } else {
            Admitted::Rejected
        }
    }

    /// Next queued job for a slot that just finished one. Releases the slot
    /// when the line is empty.
    fn next_job(&self) -> Option<Job> {
        let mut admission = self.admission();
        while let Some(job) = admission.pending.pop_front() {
            if job.handle.is_cancelled() {
                self.handles_mut().remove(&job.task.id());
                continue;
            }
            return Some(job);
        }
        admission.active -= 1;
        None
    }

    // ----- Execution -----

    async fn work(self: Arc<Self>, first: Job) {
        let mut job = first;
        loop {
            // A panic outside the backend call (notifier, store) must not
            // leak the slot.
            if let Err(payload) = AssertUnwindSafe(self.execute(job)).catch_unwind().await {
                tracing::error!(
                    error = %panic_message(payload.as_ref()),
                    "Worker panicked while finishing a task"
                );
            }
            match self.next_job() {
                Some(next) => job = next,
                None => break,
            }
        }
    }

    async fn execute(&self, job: Job) {
        let Job { task, action, handle } = job;
        let task_id = task.id();

        self.running_mut().insert(task_id, task.clone());
        let _guard = RunningGuard { queue: self, task_id };

        let outcome = tokio::select! {
            biased;
            _ = handle.cancelled() => {
                tracing::info!(task_id = %task_id, status = %task.status(), "Task cancelled");
                return;
            }
            outcome = AssertUnwindSafe(self.drive(&task, action)).catch_unwind() => outcome,
        };

        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(payload) => QueueError::Panicked(panic_message(payload.as_ref())),
        };
        self.fail_unexpected(&task, &error).await;
    }

    /// Submit the task to the backend and follow it to a terminal status.
    async fn drive(&self, task: &LiveTask, action: SubmitAction) -> Result<(), QueueError> {
        let task_id = task.id();

        task.update(|t| t.start())?;
        tracing::debug!(task_id = %task_id, "Submitting task to backend");

        let message = action.invoke(task.clone()).await;
        if !message.is_success() {
            tracing::warn!(
                task_id = %task_id,
                code = message.code.code(),
                description = %message.description,
                "Backend rejected task"
            );
            // Reports that arrived while the action ran still go out first.
            let mut last_reported = None;
            while let Some(reported) = task.try_next_status() {
                self.persist_and_notify(&reported).await?;
                last_reported = Some(reported.status());
            }
            if last_reported.is_some_and(TaskStatus::is_terminal) {
                return Ok(());
            }
            let snapshot = task.update(|t| {
                if !t.status().is_terminal() {
                    t.fail(message.description.clone())?;
                }
                Ok::<_, CoreError>(t.clone())
            })?;
            self.persist_and_notify(&snapshot).await?;
            return Ok(());
        }

        // If the backend already reported while the action ran, the task is
        // past NOT_START and those reports are queued in order: start from
        // the oldest of them instead of the current state.
        let submitted = task.update(|t| {
            if t.status() != TaskStatus::NotStart {
                return Ok(None);
            }
            t.submit()?;
            Ok::<_, CoreError>(Some(t.clone()))
        })?;
        let mut current = match submitted {
            Some(snapshot) => snapshot,
            None => task.wait_for_next_status(self.config.task_timeout).await?,
        };
        self.persist_and_notify(&current).await?;

        while !current.status().is_terminal() {
            current = task.wait_for_next_status(self.config.task_timeout).await?;
            tracing::debug!(
                task_id = %task_id,
                status = %current.status(),
                progress = current.progress.as_deref().unwrap_or(""),
                "Task status changed"
            );
            self.persist_and_notify(&current).await?;
        }

        match current.status() {
            TaskStatus::Success => {
                tracing::info!(task_id = %task_id, "Task succeeded");
                self.post_process(task, &current).await;
            }
            _ => {
                tracing::info!(
                    task_id = %task_id,
                    fail_reason = current.fail_reason.as_deref().unwrap_or(""),
                    "Task failed"
                );
            }
        }
        Ok(())
    }

    async fn persist_and_notify(&self, task: &Task) -> Result<(), QueueError> {
        self.store.save(task).await?;
        self.notifier.notify_task_change(task);
        Ok(())
    }

    /// Mark the task `FAILURE` after an error nobody reported.
    async fn fail_unexpected(&self, task: &LiveTask, error: &QueueError) {
        let task_id = task.id();
        tracing::error!(task_id = %task_id, error = %error, "Task execution failed");

        let failed = task.update(|t| {
            if t.status().is_terminal() {
                None
            } else {
                t.fail(EXECUTION_FAILED).ok().map(|()| t.clone())
            }
        });
        let Some(snapshot) = failed else {
            tracing::warn!(task_id = %task_id, status = %task.status(), "Task already terminal, status kept");
            return;
        };

        if let Err(e) = self.store.save(&snapshot).await {
            tracing::error!(task_id = %task_id, error = %e, "Failed to persist failed task");
        }
        self.notifier.notify_task_change(&snapshot);
    }

    async fn post_process(&self, task: &LiveTask, snapshot: &Task) {
        let task_id = task.id();
        match self.post_processor.process(snapshot).await {
            Ok(Some(url)) => {
                let updated = task.update(|t| {
                    t.result_url = Some(url);
                    t.clone()
                });
                match self.store.save(&updated).await {
                    Ok(()) => tracing::debug!(task_id = %task_id, "Result URL replaced"),
                    Err(e) => {
                        tracing::error!(task_id = %task_id, error = %e, "Failed to persist processed result");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "Post-processing failed, keeping original result");
            }
        }
    }

    // ----- Queries -----

    /// Ids of every admitted task, queued or running.
    pub fn queue_task_ids(&self) -> Vec<TaskId> {
        self.handles().keys().copied().collect()
    }

    pub fn running_task(&self, id: TaskId) -> Option<LiveTask> {
        self.running().get(&id).cloned()
    }

    /// Running tasks whose current state satisfies `predicate`.
    pub fn find_running(&self, predicate: &dyn TaskPredicate) -> Vec<LiveTask> {
        self.running()
            .values()
            .filter(|task| task.update(|t| predicate.test(t)))
            .cloned()
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.running().len()
    }

    pub fn handle(&self, id: TaskId) -> Option<TaskHandle> {
        self.handles().get(&id).cloned()
    }

    /// Tasks waiting for a slot.
    pub fn pending_len(&self) -> usize {
        self.admission().pending.len()
    }

    /// Slots currently owned by a worker.
    pub fn active_workers(&self) -> usize {
        self.admission().active
    }

    // ----- Control -----

    /// Cancel a queued or running task.
    ///
    /// A queued task is dropped before it ever starts; a running one stops
    /// at its next suspension point. Neither gets a new status. Returns
    /// `false` if the task is not admitted.
    pub fn cancel(&self, id: TaskId) -> bool {
        let dequeued = {
            let mut admission = self.admission();
            let position = admission.pending.iter().position(|job| job.task.id() == id);
            position.and_then(|pos| admission.pending.remove(pos))
        };

        if let Some(job) = dequeued {
            job.handle.cancel();
            self.handles_mut().remove(&id);
            tracing::info!(task_id = %id, "Queued task cancelled");
            return true;
        }

        match self.handles().get(&id) {
            Some(handle) => {
                handle.cancel();
                tracing::info!(task_id = %id, "Running task cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Stop admitting tasks, drop the waiting line and cancel running work.
    pub fn shutdown(&self) {
        let dropped: Vec<Job> = {
            let mut admission = self.admission();
            admission.closed = true;
            admission.pending.drain(..).collect()
        };

        {
            let mut handles = self.handles_mut();
            for job in &dropped {
                handles.remove(&job.task.id());
            }
        }

        self.cancel.cancel();
        tracing::info!(dropped = dropped.len(), "Task queue shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ----- Locks -----

    fn admission(&self) -> MutexGuard<'_, Admission> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running(&self) -> RwLockReadGuard<'_, HashMap<TaskId, LiveTask>> {
        self.running.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn running_mut(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, LiveTask>> {
        self.running.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handles(&self) -> RwLockReadGuard<'_, HashMap<TaskId, TaskHandle>> {
        self.handles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn handles_mut(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskHandle>> {
        self.handles.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a task from the running set and handle map however its
/// execution ends.
struct RunningGuard<'a> {
    queue: &'a TaskQueue,
    task_id: TaskId,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.queue.running_mut().remove(&self.task_id);
        self.queue.handles_mut().remove(&self.task_id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
