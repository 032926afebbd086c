//! Task change notification for drawq.
//!
//! - [`Notifier`]: the fire-and-forget contract the queue calls on every
//!   observed status change.
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`TaskEvent`]s.
//! - [`EventLogger`]: bus subscriber that writes every event to the log.
//! - [`delivery`]: external delivery (per-task webhook).

pub mod bus;
pub mod delivery;
pub mod logger;
pub mod notifier;

pub use bus::{EventBus, TaskEvent};
pub use delivery::webhook::{WebhookDelivery, WebhookNotifier};
pub use logger::EventLogger;
pub use notifier::{Notifier, Notifiers};
