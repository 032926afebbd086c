//! Bus subscriber that records every task event in the log.
//!
//! [`EventLogger`] runs as a long-lived background task and shuts down when
//! the [`EventBus`](crate::bus::EventBus) is dropped.

use tokio::sync::broadcast;

use crate::bus::TaskEvent;

pub struct EventLogger;

impl EventLogger {
    /// Log every event received on `receiver` until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<TaskEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        task_id = %event.task.id,
                        progress = event.task.progress.as_deref().unwrap_or(""),
                        fail_reason = event.task.fail_reason.as_deref().unwrap_or(""),
                        "Task event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }
}
