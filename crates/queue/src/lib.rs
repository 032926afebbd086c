//! Bounded draw-task queue.
//!
//! [`TaskQueue`] admits tasks into a fixed pool of worker slots backed by a
//! bounded waiting queue, drives each admitted task through its backend
//! submission and status polling, and persists and announces every status
//! change it observes.
//!
//! Backend integrations interact with a task while it runs through its
//! [`LiveTask`]: the [`SubmitAction`] receives it, and status reports are
//! applied with [`LiveTask::report`].

pub mod action;
pub mod config;
pub mod error;
pub mod handle;
pub mod hook;
pub mod live;
pub mod scheduler;

pub use action::SubmitAction;
pub use config::{ConfigError, QueueConfig};
pub use error::QueueError;
pub use handle::TaskHandle;
pub use hook::{NoopPostProcessor, PostProcessError, PostProcessor};
pub use live::LiveTask;
pub use scheduler::TaskQueue;
