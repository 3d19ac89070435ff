//! The unit of work and the context it runs in.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::command::CallerContext;
use crate::error::TaskError;
use crate::runner::ProgressReporter;

/// A unit of work bound to exactly one command.
///
/// Instances are created fresh by the resolver for every submission and
/// consumed by `execute`, so one instance never runs twice.
#[async_trait]
pub trait Task: Send {
    /// Run the task to completion on a worker.
    ///
    /// Long-running bodies should poll `ctx.is_cancelled()` or await
    /// `ctx.sleep()` so cancellation requests can take effect.
    async fn execute(self: Box<Self>, ctx: &TaskContext) -> Result<serde_json::Value, TaskError>;
}

/// Execution context handed to a task body.
///
/// Only lives for the duration of a single `execute` call; the caller's
/// identity is dropped along with it.
pub struct TaskContext {
    task_id: String,
    caller: CallerContext,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: impl Into<String>,
        caller: CallerContext,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            caller,
            progress,
            cancel,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Identity of the submitter.
    pub fn caller(&self) -> &CallerContext {
        &self.caller
    }

    /// Progress reporting scoped to this task.
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Return `TaskError::Cancelled` if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with `TaskError::Cancelled`.
    pub async fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TaskError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_wakes_on_cancel() {
        let cancel = CancellationToken::new();
        let ctx = TaskContext::new(
            "t1",
            CallerContext::anonymous(),
            ProgressReporter::detached("t1"),
            cancel.clone(),
        );

        cancel.cancel();
        let result = ctx.sleep(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(TaskError::Cancelled)));
        assert!(ctx.check_cancelled().is_err());
    }

    #[tokio::test]
    async fn sleep_completes_without_cancel() {
        let ctx = TaskContext::new(
            "t1",
            CallerContext::user("bob"),
            ProgressReporter::detached("t1"),
            CancellationToken::new(),
        );

        assert!(ctx.sleep(Duration::from_millis(5)).await.is_ok());
        assert_eq!(ctx.caller().principal.as_deref(), Some("bob"));
        assert_eq!(ctx.task_id(), "t1");
    }
}
