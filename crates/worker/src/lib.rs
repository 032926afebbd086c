//! The drawq worker process: configuration and service wiring.
//!
//! [`Services::start`] builds the task store, the event bus with its
//! logging subscriber, the webhook notifier and the task queue, and spawns
//! their background tasks. [`Services::shutdown`] stops them in reverse.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use drawq_events::{EventBus, EventLogger, Notifier, Notifiers, WebhookNotifier};
use drawq_queue::TaskQueue;
use drawq_store::InMemoryTaskStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// How long shutdown waits for each background task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Running worker services.
pub struct Services {
    pub store: Arc<InMemoryTaskStore>,
    pub event_bus: Arc<EventBus>,
    pub queue: Arc<TaskQueue>,
    cancel: CancellationToken,
    sweeper_handle: JoinHandle<()>,
    dispatcher_handle: JoinHandle<()>,
    logger_handle: JoinHandle<()>,
}

impl Services {
    pub fn start(config: WorkerConfig) -> anyhow::Result<Self> {
        let cancel = CancellationToken::new();

        // --- Task store ---
        let store = Arc::new(InMemoryTaskStore::new(config.store_timeout));
        let sweeper_handle = tokio::spawn(
            Arc::clone(&store).run_sweeper(config.sweep_interval, cancel.child_token()),
        );

        // --- Event bus ---
        let event_bus = Arc::new(EventBus::default());
        let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

        // --- Webhooks ---
        let (webhooks, dispatcher_handle) =
            WebhookNotifier::start(config.notify_pool_size, cancel.child_token())?;

        let notifiers = Notifiers::new()
            .with(Arc::clone(&event_bus) as Arc<dyn Notifier>)
            .with(Arc::new(webhooks));

        // --- Task queue ---
        let queue = Arc::new(TaskQueue::new(
            config.queue.clone(),
            Arc::clone(&store) as _,
            Arc::new(notifiers),
        ));

        tracing::info!(
            core_size = config.queue.core_size,
            queue_size = config.queue.queue_size,
            task_timeout_secs = config.queue.task_timeout.as_secs(),
            "Task queue started"
        );

        Ok(Self {
            store,
            event_bus,
            queue,
            cancel,
            sweeper_handle,
            dispatcher_handle,
            logger_handle,
        })
    }

    /// Stop the queue first (it may still notify), then the background
    /// tasks.
    pub async fn shutdown(self) {
        self.queue.shutdown();

        self.cancel.cancel();
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.sweeper_handle).await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.dispatcher_handle).await;
        tracing::info!("Store sweeper and webhook dispatcher stopped");

        // The queue holds the bus as a notifier; both must go before the
        // logger sees the channel close.
        drop(self.queue);
        drop(self.event_bus);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.logger_handle).await;
        tracing::info!("Event logger stopped");
    }
}
