//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`TaskEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` and doubles as a
//! [`Notifier`](crate::Notifier) so the queue can publish to it directly.

use chrono::Utc;
use drawq_core::{Task, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::notifier::Notifier;

// ---------------------------------------------------------------------------
// TaskEvent
// ---------------------------------------------------------------------------

/// A task status change observed by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Dot-separated event name, e.g. `"task.in_progress"`.
    pub event_type: String,

    /// Task snapshot at the time of the change.
    pub task: Task,

    /// When the event was created (UTC).
    pub timestamp: Timestamp,
}

impl TaskEvent {
    /// Build the event for `task`'s current status.
    pub fn task_changed(task: &Task) -> Self {
        Self {
            event_type: format!("task.{}", task.status().as_str().to_ascii_lowercase()),
            task: task.clone(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use drawq_core::{Task, TaskAction};
/// use drawq_events::bus::{EventBus, TaskEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(TaskEvent::task_changed(&Task::new(TaskAction::Imagine)));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: TaskEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier for EventBus {
    fn notify_task_change(&self, task: &Task) {
        self.publish(TaskEvent::task_changed(task));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
