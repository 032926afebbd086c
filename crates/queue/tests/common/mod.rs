#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drawq_core::{Message, Task, TaskId, TaskStatus};
use drawq_events::Notifier;
use drawq_queue::{LiveTask, QueueConfig, SubmitAction, TaskQueue};
use drawq_store::InMemoryTaskStore;
use tokio::sync::watch;

/// Store idle window used by every test queue.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Notifier that remembers every snapshot it was told about.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Task>>,
}

impl RecordingNotifier {
    pub fn statuses_of(&self, id: TaskId) -> Vec<TaskStatus> {
        self.snapshots_of(id).iter().map(Task::status).collect()
    }

    /// `(status, progress)` of every notification for `id`, in order.
    pub fn progress_of(&self, id: TaskId) -> Vec<(TaskStatus, Option<String>)> {
        self.snapshots_of(id)
            .into_iter()
            .map(|task| (task.status(), task.progress))
            .collect()
    }

    fn snapshots_of(&self, id: TaskId) -> Vec<Task> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|task| task.id == id)
            .cloned()
            .collect()
    }

    pub fn saw(&self, id: TaskId, status: TaskStatus) -> bool {
        self.statuses_of(id).contains(&status)
    }
}

impl Notifier for RecordingNotifier {
    fn notify_task_change(&self, task: &Task) {
        self.seen.lock().unwrap().push(task.clone());
    }
}

pub struct Harness {
    pub queue: Arc<TaskQueue>,
    pub store: Arc<InMemoryTaskStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn config(core_size: usize, queue_size: usize) -> QueueConfig {
    QueueConfig {
        core_size,
        queue_size,
        task_timeout: Duration::from_secs(60),
    }
}

pub fn harness(config: QueueConfig) -> Harness {
    let store = Arc::new(InMemoryTaskStore::new(STORE_TIMEOUT));
    let notifier = Arc::new(RecordingNotifier::default());
    let queue = Arc::new(TaskQueue::new(
        config,
        Arc::clone(&store) as _,
        Arc::clone(&notifier) as _,
    ));
    Harness {
        queue,
        store,
        notifier,
    }
}

/// Poll `condition` until it holds, panicking after a generous bound.
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..1000 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Wait until a live task reaches `status`.
pub async fn reached(task: &LiveTask, status: TaskStatus) {
    eventually(|| {
        let current = task.status();
        async move { current == status }
    })
    .await;
}

/// Holds actions back until opened.
#[derive(Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub async fn passed(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// Action that returns `message` once `gate` opens.
pub fn gated(gate: &Gate, message: Message) -> SubmitAction {
    let gate = gate.clone();
    SubmitAction::new(move |_task| async move {
        gate.passed().await;
        message
    })
}

/// Action that is accepted by the backend and never reported on.
pub fn accepted() -> SubmitAction {
    SubmitAction::new(|_task| async { Message::success() })
}

/// Action that is accepted, then reports each of `progress` followed by
/// success with `url` once the task is `SUBMITTED`.
pub fn completes(progress: &[&str], url: &str) -> SubmitAction {
    let progress: Vec<String> = progress.iter().map(|p| p.to_string()).collect();
    let url = url.to_string();
    SubmitAction::new(move |task: LiveTask| async move {
        tokio::spawn(async move {
            reached(&task, TaskStatus::Submitted).await;
            for p in progress {
                task.report(|t| t.in_progress(p)).unwrap();
            }
            task.report(|t| t.success(url)).unwrap();
        });
        Message::success()
    })
}

/// Action whose backend reports `progress` (and success with `url`, if
/// given) before the submission call itself returns.
pub fn reports_early(progress: &[&str], url: Option<&str>) -> SubmitAction {
    let progress: Vec<String> = progress.iter().map(|p| p.to_string()).collect();
    let url = url.map(str::to_string);
    SubmitAction::new(move |task: LiveTask| async move {
        for p in progress {
            task.report(|t| t.in_progress(p)).unwrap();
        }
        if let Some(url) = url {
            task.report(|t| t.success(url)).unwrap();
        }
        Message::success()
    })
}
