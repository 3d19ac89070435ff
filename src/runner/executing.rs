//! Executing task: wraps one command and its task as a schedulable unit.
//!
//! Lifecycle: `Created → Running → {Finished | Failed}`. The body's errors
//! and panics are turned into a failed `TaskResult`; they never reach the
//! worker pool. Progress capture is torn down on every exit path.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::guard::TeardownGuard;
use super::progress::ProgressCapture;
use crate::error::TaskError;
use crate::task::{Task, TaskCommand, TaskContext, TaskResult};

/// Callbacks fired around a task body.
#[async_trait]
pub trait TaskLifecycle: Send + Sync {
    /// Fired right before the body starts.
    async fn on_start(&self, _task_id: &str) {}

    /// Fired after the body returned normally.
    async fn on_finish(&self, _task_id: &str, _payload: &serde_json::Value) {}

    /// Fired after the body returned an error or panicked.
    async fn on_failure(&self, _task_id: &str, _error: &TaskError) {}
}

/// Execution state of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Created,
    Running,
    Finished,
    Failed,
}

impl ExecutionState {
    pub fn can_transition_to(&self, target: ExecutionState) -> bool {
        use ExecutionState::*;

        matches!(
            (self, target),
            (Created, Running) | (Running, Finished) | (Running, Failed)
        )
    }
}

/// Outcome of `ExecutingTask::run`.
#[derive(Debug, Clone)]
pub struct Execution {
    pub task_id: String,
    /// `Created` if the task was cancelled before it could start.
    pub state: ExecutionState,
    pub result: Option<TaskResult>,
}

impl Execution {
    pub fn started(&self) -> bool {
        self.state != ExecutionState::Created
    }
}

/// One-shot unit of work: a command, its task, callbacks and progress sink.
pub struct ExecutingTask {
    command: TaskCommand,
    task: Box<dyn Task>,
    lifecycle: Arc<dyn TaskLifecycle>,
    progress: ProgressCapture,
    cancel: CancellationToken,
    state: ExecutionState,
}

impl ExecutingTask {
    pub fn new(
        command: TaskCommand,
        task: Box<dyn Task>,
        lifecycle: Arc<dyn TaskLifecycle>,
        progress: ProgressCapture,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            command,
            task,
            lifecycle,
            progress,
            cancel,
            state: ExecutionState::Created,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.command.id
    }

    /// Run the task body once.
    pub async fn run(mut self) -> Execution {
        let task_id = self.command.id.clone();

        if self.cancel.is_cancelled() {
            tracing::info!(task_id = %task_id, "Task cancelled before start, skipping");
            return Execution {
                task_id,
                state: self.state,
                result: None,
            };
        }

        let progress = &self.progress;
        progress.initialize();
        let _teardown = TeardownGuard::new(|| progress.tear_down());

        let ctx = TaskContext::new(
            &task_id,
            self.command.caller.clone(),
            progress.reporter(),
            self.cancel.clone(),
        );

        self.state = advance(&task_id, self.state, ExecutionState::Running);
        tracing::info!(
            task_id = %task_id,
            task_type = %self.command.task_type,
            "Task started"
        );
        self.lifecycle.on_start(&task_id).await;

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.task.execute(&ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(panic.as_ref()))));
        drop(ctx);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(payload) => {
                let state = advance(&task_id, self.state, ExecutionState::Finished);
                tracing::info!(task_id = %task_id, elapsed_ms, "Task finished");
                self.lifecycle.on_finish(&task_id, &payload).await;
                Execution {
                    result: Some(TaskResult::success(&task_id, payload)),
                    task_id,
                    state,
                }
            }
            Err(error) => {
                let state = advance(&task_id, self.state, ExecutionState::Failed);
                tracing::warn!(task_id = %task_id, elapsed_ms, "Task failed: {}", error);
                self.lifecycle.on_failure(&task_id, &error).await;
                Execution {
                    result: Some(TaskResult::failure(&task_id, &error)),
                    task_id,
                    state,
                }
            }
        }
    }
}

fn advance(task_id: &str, from: ExecutionState, to: ExecutionState) -> ExecutionState {
    if !from.can_transition_to(to) {
        tracing::error!(task_id, ?from, ?to, "Illegal execution transition");
    }
    to
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records lifecycle callbacks in order.
    #[derive(Default)]
    struct RecordingLifecycle {
        events: Mutex<Vec<String>>,
    }

    impl RecordingLifecycle {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskLifecycle for RecordingLifecycle {
        async fn on_start(&self, _task_id: &str) {
            self.events.lock().unwrap().push("start".to_string());
        }
        async fn on_finish(&self, _task_id: &str, _payload: &serde_json::Value) {
            self.events.lock().unwrap().push("finish".to_string());
        }
        async fn on_failure(&self, _task_id: &str, error: &TaskError) {
            self.events.lock().unwrap().push(format!("failure: {error}"));
        }
    }

    enum Behaviour {
        Return(&'static str),
        Fail(&'static str),
        Panic,
    }

    struct ScriptedTask(Behaviour);

    #[async_trait]
    impl Task for ScriptedTask {
        async fn execute(
            self: Box<Self>,
            ctx: &TaskContext,
        ) -> Result<serde_json::Value, TaskError> {
            ctx.progress().info("working").await;
            match self.0 {
                Behaviour::Return(v) => Ok(serde_json::json!(v)),
                Behaviour::Fail(msg) => Err(TaskError::failed(msg)),
                Behaviour::Panic => panic!("task blew up"),
            }
        }
    }

    fn executing(
        behaviour: Behaviour,
        lifecycle: Arc<RecordingLifecycle>,
        cancel: CancellationToken,
    ) -> ExecutingTask {
        ExecutingTask::new(
            TaskCommand::with_id("x1", "scripted"),
            Box::new(ScriptedTask(behaviour)),
            lifecycle,
            ProgressCapture::detached("x1"),
            cancel,
        )
    }

    #[tokio::test]
    async fn normal_return_finishes() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let task = executing(
            Behaviour::Return("ok"),
            Arc::clone(&lifecycle),
            CancellationToken::new(),
        );

        let execution = task.run().await;
        assert_eq!(execution.state, ExecutionState::Finished);
        let result = execution.result.unwrap();
        assert_eq!(result.payload, Some(serde_json::json!("ok")));
        assert!(result.error.is_none());
        assert_eq!(lifecycle.events(), vec!["start", "finish"]);
    }

    #[tokio::test]
    async fn error_becomes_failed_result() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let task = executing(
            Behaviour::Fail("Boom"),
            Arc::clone(&lifecycle),
            CancellationToken::new(),
        );

        let execution = task.run().await;
        assert_eq!(execution.state, ExecutionState::Failed);
        let result = execution.result.unwrap();
        assert_eq!(result.task_id, "x1");
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some("Boom"));
        assert_eq!(lifecycle.events(), vec!["start", "failure: Boom"]);
    }

    #[tokio::test]
    async fn panic_becomes_failed_result() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let task = executing(
            Behaviour::Panic,
            Arc::clone(&lifecycle),
            CancellationToken::new(),
        );

        let execution = task.run().await;
        assert_eq!(execution.state, ExecutionState::Failed);
        let error = execution.result.unwrap().error.unwrap();
        assert!(error.contains("task blew up"), "got {error}");
        assert_eq!(lifecycle.events().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_runs() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let task = executing(Behaviour::Return("ok"), Arc::clone(&lifecycle), cancel);

        let execution = task.run().await;
        assert_eq!(execution.state, ExecutionState::Created);
        assert!(!execution.started());
        assert!(execution.result.is_none());
        assert!(lifecycle.events().is_empty());
    }

    #[test]
    fn execution_transitions() {
        assert!(ExecutionState::Created.can_transition_to(ExecutionState::Running));
        assert!(ExecutionState::Running.can_transition_to(ExecutionState::Failed));
        assert!(!ExecutionState::Created.can_transition_to(ExecutionState::Finished));
        assert!(!ExecutionState::Finished.can_transition_to(ExecutionState::Running));
    }
}
