//! Error types for the task worker.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Rejections raised synchronously by `TaskRunner::submit`.
///
/// Nothing has been queued when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Malformed command: {reason}")]
    MalformedCommand { reason: String },

    #[error("No task registered for type '{task_type}'")]
    TaskTypeNotRegistered { task_type: String },

    #[error("Task id {task_id} is already in use")]
    DuplicateTaskId { task_id: String },

    #[error("Task runner is shut down")]
    ShutDown,
}

impl SubmitError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCommand {
            reason: reason.into(),
        }
    }
}

/// Errors raised by a task body.
///
/// These never escape the runner; they are recorded on the task's result.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Delivery failures on a result, status or progress channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} is closed")]
    Closed { name: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Completion notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("No recipient for task {task_id}")]
    NoRecipient { task_id: String },

    #[error("Failed to send notification via {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Worker pool errors.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    ShutDown,
}
