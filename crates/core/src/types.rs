/// Task identifiers are time-ordered UUIDs (v7).
pub type TaskId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh task identifier.
pub fn new_task_id() -> TaskId {
    uuid::Uuid::now_v7()
}
