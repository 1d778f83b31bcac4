//! Task identifiers, states and the serializable status view.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Opaque, process-unique task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed(String),
    /// Never issued, or already evicted.
    NotFound,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed(_) => "failed",
            TaskStatus::NotFound => "not_found",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed(_))
    }

    /// Position in `queued → processing → terminal`. Transitions only move
    /// to a strictly higher rank.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            TaskStatus::NotFound => 0,
            TaskStatus::Queued => 1,
            TaskStatus::Processing => 2,
            TaskStatus::Completed | TaskStatus::Failed(_) => 3,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub status: TaskStatus,
    /// Latest progress or result message.
    pub message: Option<String>,
    pub offer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub(crate) fn queued(offer_id: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            status: TaskStatus::Queued,
            message: None,
            offer_id,
            created_at: now,
            finished_at: None,
        }
    }
}

/// What a status endpoint returns for a task id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskStatusResponse {
    pub fn not_found(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: TaskStatus::NotFound.as_str(),
            message: None,
        }
    }

    pub(crate) fn from_record(task_id: TaskId, record: &TaskRecord) -> Self {
        let message = match &record.status {
            TaskStatus::Failed(reason) => Some(reason.clone()),
            _ => record.message.clone(),
        };
        Self {
            task_id,
            status: record.status.as_str(),
            message,
        }
    }
}
