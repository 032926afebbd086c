//! Domain types shared by every drawq crate.
//!
//! - [`task`]: the [`Task`] record and its status state machine.
//! - [`result`]: return codes, backend replies and submission results.
//! - [`condition`]: predicates used to filter stored and running tasks.

pub mod condition;
pub mod error;
pub mod result;
pub mod task;
pub mod types;

pub use condition::{TaskCondition, TaskPredicate};
pub use error::CoreError;
pub use result::{Message, ReturnCode, SubmitResult};
pub use task::{Task, TaskAction, TaskStatus};
pub use types::{TaskId, Timestamp};
