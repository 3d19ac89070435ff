//! Messages produced by a task: its result, status transitions and progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;
use crate::error::TaskError;

/// Outcome of one task execution.
///
/// `payload` and `error` are never both set. A failed result always carries
/// the task id even though its payload is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub payload: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(task_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            task_id: task_id.into(),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(task_id: impl Into<String>, error: &TaskError) -> Self {
        Self {
            task_id: task_id.into(),
            payload: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// One status transition of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub task_id: String,
    pub status: TaskStatus,
    pub timestamp: DateTime<Utc>,
}

impl TaskStatusUpdate {
    pub fn now(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            timestamp: Utc::now(),
        }
    }
}

/// A human-readable progress line for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub task_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn now(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_has_no_payload() {
        let result = TaskResult::failure("t2", &TaskError::failed("Boom"));
        assert_eq!(result.task_id, "t2");
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some("Boom"));
        assert!(result.is_failure());
    }

    #[test]
    fn success_has_no_error() {
        let result = TaskResult::success("t1", serde_json::json!("ok"));
        assert!(!result.is_failure());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"task_id": "t1", "payload": "ok", "error": null})
        );
    }
}
