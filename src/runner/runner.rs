//! Task runner: queues commands on the worker pool and reports their
//! lifecycle through the configured channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::executing::{ExecutingTask, Execution, TaskLifecycle};
use super::handle::SubmittedTaskHandle;
use super::hooks::{NotificationSender, PostCompletionHooks};
use super::pool::WorkerPool;
use super::progress::ProgressCapture;
use super::registry::TaskRegistry;
use crate::channels::TaskChannels;
use crate::config::RunnerConfig;
use crate::error::{ConfigError, SubmitError};
use crate::task::{CallerContext, TaskCommand, TaskResolver, TaskStatus};

/// Runs submitted tasks on a bounded worker pool.
pub struct TaskRunner {
    config: RunnerConfig,
    resolver: Arc<TaskResolver>,
    channels: TaskChannels,
    hooks: PostCompletionHooks,
    registry: TaskRegistry,
    pool: WorkerPool,
    accepting: AtomicBool,
}

/// What the completion step needs once a job leaves the worker.
struct Completion {
    handle: Arc<SubmittedTaskHandle>,
    registry: TaskRegistry,
    hooks: PostCompletionHooks,
    caller: CallerContext,
    notify: bool,
}

impl TaskRunner {
    /// Create a runner and start its worker pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: RunnerConfig,
        resolver: Arc<TaskResolver>,
        channels: TaskChannels,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = WorkerPool::new(&config);

        tracing::info!(
            min_workers = config.min_workers,
            max_workers = config.max_workers,
            task_types = resolver.count(),
            "Task runner started"
        );

        Ok(Self {
            config,
            resolver,
            channels,
            hooks: PostCompletionHooks::new(),
            registry: TaskRegistry::new(),
            pool,
            accepting: AtomicBool::new(true),
        })
    }

    /// Send completion notifications through `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.hooks = std::mem::take(&mut self.hooks).with_notifier(notifier);
        self
    }

    /// Track handles in an externally owned registry.
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Queue a command for execution and return its task id.
    ///
    /// The handle is registered before this returns, so `get_handle` on the
    /// returned id succeeds until the task completes.
    pub fn submit(&self, command: TaskCommand) -> Result<String, SubmitError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(SubmitError::ShutDown);
        }

        let task = self.resolver.resolve(&command)?;
        let task_id = command.id.clone();

        let handle = Arc::new(SubmittedTaskHandle::new(
            &command,
            self.channels.clone(),
            self.config.progress_buffer_capacity,
        ));
        self.registry.insert(Arc::clone(&handle))?;

        let completion = Completion {
            handle: Arc::clone(&handle),
            registry: self.registry.clone(),
            hooks: self.hooks.clone(),
            caller: command.caller.clone(),
            notify: command.notify_on_completion,
        };
        let task_type = command.task_type.clone();
        let executing = ExecutingTask::new(
            command,
            task,
            Arc::clone(&handle) as Arc<dyn TaskLifecycle>,
            ProgressCapture::new(Arc::clone(&handle)),
            handle.cancellation_token(),
        );

        let job = Box::pin(async move {
            let execution = executing.run().await;
            completion.finish(execution).await;
        });

        if self.pool.execute(job).is_err() {
            self.registry.remove(&task_id);
            return Err(SubmitError::ShutDown);
        }

        tracing::info!(task_id = %task_id, task_type = %task_type, "Task submitted");
        Ok(task_id)
    }

    /// Look up the handle of an in-flight task.
    pub fn get_handle(&self, task_id: &str) -> Option<Arc<SubmittedTaskHandle>> {
        self.registry.get(task_id)
    }

    /// Request cancellation of an in-flight task.
    ///
    /// Returns `false` if the task is unknown or already past cancelling.
    pub async fn request_cancellation(&self, task_id: &str) -> bool {
        match self.registry.get(task_id) {
            Some(handle) => handle.request_cancellation().await,
            None => {
                tracing::debug!(task_id, "Cancellation requested for unknown task");
                false
            }
        }
    }

    /// Number of in-flight tasks (queued or running).
    pub fn running_count(&self) -> usize {
        self.registry.len()
    }

    /// Ids of all in-flight tasks.
    pub fn task_ids(&self) -> Vec<String> {
        self.registry.task_ids()
    }

    pub fn is_shut_down(&self) -> bool {
        !self.accepting.load(Ordering::Acquire)
    }

    pub fn resolver(&self) -> &Arc<TaskResolver> {
        &self.resolver
    }

    /// Channels every handle of this runner publishes to.
    pub fn channels(&self) -> &TaskChannels {
        &self.channels
    }

    /// Stop accepting work and interrupt everything in flight.
    ///
    /// Queued tasks never start; running task bodies are dropped at their
    /// next suspension point. Nothing is drained.
    pub fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return;
        }

        let abandoned = self.pool.shutdown_now();
        let interrupted = self.registry.drain();
        for handle in &interrupted {
            handle.interrupt();
        }

        tracing::warn!(
            abandoned,
            interrupted = interrupted.len(),
            "Task runner shut down"
        );
    }

    /// Resolve once every submitted task has delivered its outcome and left
    /// the registry.
    pub async fn wait_idle(&self) {
        self.registry.wait_empty().await
    }

    /// Wait for every worker to exit after `shutdown`.
    pub async fn await_termination(&self) {
        self.pool.wait().await
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Completion {
    /// Deliver the outcome, then retire the handle.
    ///
    /// The handle stays registered until delivery is done so that
    /// `wait_idle` never resolves ahead of a pending result.
    async fn finish(self, execution: Execution) {
        let task_id = self.handle.task_id().to_string();
        self.deliver(&task_id, execution).await;
        self.registry.remove(&task_id);
    }

    async fn deliver(&self, task_id: &str, execution: Execution) {
        let Some(result) = execution.result else {
            self.handle.mark_cancelled().await;
            tracing::info!(task_id, "Task cancelled before it started");
            return;
        };

        self.handle.complete(result.clone());

        if self.handle.status().await == TaskStatus::Cancelled {
            tracing::info!(task_id, "Task was cancelled, result not delivered");
            return;
        }

        if !self.handle.send_result_if_done().await {
            return;
        }

        if self.notify {
            self.hooks.attach_notification(
                self.caller.clone(),
                result,
                self.handle.recent_progress(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::task::{Task, TaskContext};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        async fn execute(
            self: Box<Self>,
            _ctx: &TaskContext,
        ) -> Result<serde_json::Value, TaskError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn runner() -> TaskRunner {
        let resolver = Arc::new(TaskResolver::new());
        resolver.register("noop", |_: &TaskCommand| Noop);
        let (channels, _rx) = TaskChannels::unbounded();
        let config = RunnerConfig {
            min_workers: 1,
            max_workers: 2,
            ..Default::default()
        };
        TaskRunner::new(config, resolver, channels).unwrap()
    }

    #[tokio::test]
    async fn rejects_unknown_type() {
        let runner = runner();
        let err = runner.submit(TaskCommand::new("nope")).unwrap_err();
        assert!(matches!(err, SubmitError::TaskTypeNotRegistered { .. }));
        assert_eq!(runner.running_count(), 0);
    }

    #[tokio::test]
    async fn rejects_malformed_command() {
        let runner = runner();
        let err = runner.submit(TaskCommand::with_id("", "noop")).unwrap_err();
        assert!(matches!(err, SubmitError::MalformedCommand { .. }));
    }

    #[tokio::test]
    async fn rejects_after_shutdown() {
        let runner = runner();
        runner.shutdown();
        assert!(runner.is_shut_down());
        let err = runner.submit(TaskCommand::new("noop")).unwrap_err();
        assert!(matches!(err, SubmitError::ShutDown));
    }

    #[tokio::test]
    async fn handle_visible_right_after_submit() {
        let runner = runner();
        let id = runner.submit(TaskCommand::new("noop")).unwrap();
        // current-thread runtime: the job cannot run before we yield.
        assert!(runner.get_handle(&id).is_some());
    }

    #[tokio::test]
    async fn wait_idle_resolves_once_work_is_done() {
        let runner = runner();
        runner.wait_idle().await;

        let id = runner.submit(TaskCommand::new("noop")).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), runner.wait_idle())
            .await
            .unwrap();
        assert!(runner.get_handle(&id).is_none());
        assert_eq!(runner.running_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let config = RunnerConfig {
            min_workers: 3,
            max_workers: 1,
            ..Default::default()
        };
        let (channels, _rx) = TaskChannels::unbounded();
        assert!(TaskRunner::new(config, Arc::new(TaskResolver::new()), channels).is_err());
    }
}
