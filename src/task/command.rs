//! Task commands and caller identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SubmitError;

/// Identity of whoever submitted a task.
///
/// Opaque to the runner: it is handed to the task body for the duration of a
/// single execution and to the notifier afterwards, nothing else reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Authenticated principal, `None` for anonymous submissions.
    pub principal: Option<String>,
    /// Where completion notifications go.
    pub email: Option<String>,
    /// Authorities granted to the principal.
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

/// A request to run one unit of work.
///
/// Read-only once submitted; the runner never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCommand {
    pub id: String,
    pub task_type: String,
    #[serde(default)]
    pub caller: CallerContext,
    /// Task-specific inputs.
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub notify_on_completion: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TaskCommand {
    /// Create a command with a fresh id.
    pub fn new(task_type: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), task_type)
    }

    /// Create a command with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            caller: CallerContext::anonymous(),
            params: serde_json::Value::Null,
            notify_on_completion: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_caller(mut self, caller: CallerContext) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn notify_on_completion(mut self, notify: bool) -> Self {
        self.notify_on_completion = notify;
        self
    }

    /// Reject commands without an id or a task type.
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.id.trim().is_empty() {
            return Err(SubmitError::malformed("command has no task id"));
        }
        if self.task_type.trim().is_empty() {
            return Err(SubmitError::malformed(format!(
                "command {} has no task type",
                self.id
            )));
        }
        Ok(())
    }
}
