//! Task status state machine.

use serde::{Deserialize, Serialize};

/// Status of a submitted task, as tracked by its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Queued on the worker pool, not yet started.
    Pending,
    /// The task body is executing.
    Running,
    /// The task body returned normally.
    Completed,
    /// The task body returned an error.
    Failed,
    /// Cancellation was accepted; waiting for the body to wind down.
    Cancelling,
    /// Cancellation finished; no result will be delivered.
    Cancelled,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            // From Pending
            (Pending, Running) | (Pending, Cancelling) |
            // From Running
            (Running, Completed) | (Running, Failed) | (Running, Cancelling) |
            // From Cancelling
            (Cancelling, Cancelled)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the task is still live (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelling => "CANCELLING",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}
