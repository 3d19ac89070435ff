//! Submitted task handle: the runner's proxy for one in-flight task.

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::executing::TaskLifecycle;
use crate::channels::TaskChannels;
use crate::error::TaskError;
use crate::task::{ProgressUpdate, TaskCommand, TaskResult, TaskStatus, TaskStatusUpdate};

/// State of the work behind a handle.
#[derive(Debug, Clone)]
enum Computation {
    Pending,
    Done(TaskResult),
}

/// Tracks one submitted task: status, cancellation, progress and result.
///
/// The handle owns the task's cancellation token; nothing else may cancel
/// the underlying computation.
pub struct SubmittedTaskHandle {
    task_id: String,
    task_type: String,
    submitted_at: DateTime<Utc>,
    /// Held across the status send so updates leave in transition order.
    status: Mutex<TaskStatus>,
    cancel: CancellationToken,
    computation: StdMutex<Computation>,
    progress: StdMutex<VecDeque<String>>,
    progress_capacity: usize,
    channels: TaskChannels,
}

impl SubmittedTaskHandle {
    pub fn new(command: &TaskCommand, channels: TaskChannels, progress_capacity: usize) -> Self {
        Self {
            task_id: command.id.clone(),
            task_type: command.task_type.clone(),
            submitted_at: Utc::now(),
            status: Mutex::new(TaskStatus::Pending),
            cancel: CancellationToken::new(),
            computation: StdMutex::new(Computation::Pending),
            progress: StdMutex::new(VecDeque::new()),
            progress_capacity,
            channels,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub async fn status(&self) -> TaskStatus {
        *self.status.lock().await
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the task to stop.
    ///
    /// Returns `true` and emits `CANCELLING` if the request was accepted.
    /// Cancelling a task that already finished is a no-op.
    pub async fn request_cancellation(&self) -> bool {
        let mut status = self.status.lock().await;
        let current = *status;

        if !current.can_transition_to(TaskStatus::Cancelling) {
            tracing::debug!(
                task_id = %self.task_id,
                status = %current,
                "Cancellation ignored, task is not cancellable"
            );
            return false;
        }

        self.cancel.cancel();
        tracing::info!(task_id = %self.task_id, "Cancellation requested");
        self.apply(&mut status, TaskStatus::Cancelling).await
    }

    /// Cancel the token without a status transition. Used on shutdown.
    pub(crate) fn interrupt(&self) {
        self.cancel.cancel();
    }

    /// Record a progress line locally and forward it on the progress channel.
    pub async fn add_progress_update(&self, message: impl Into<String>) {
        let message = message.into();

        if self.progress_capacity > 0 {
            let mut buffer = self.progress.lock().unwrap_or_else(|e| e.into_inner());
            buffer.push_back(message.clone());
            while buffer.len() > self.progress_capacity {
                buffer.pop_front();
            }
        }

        if let Err(e) = self
            .channels
            .progress
            .send(ProgressUpdate::now(&self.task_id, message))
            .await
        {
            tracing::warn!(
                task_id = %self.task_id,
                channel = self.channels.progress.name(),
                "Failed to deliver progress update: {}", e
            );
        }
    }

    /// Most recent progress lines, oldest first.
    pub fn recent_progress(&self) -> Vec<String> {
        self.progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Move to `target` and publish it. Illegal transitions are refused.
    pub async fn update_status(&self, target: TaskStatus) -> bool {
        let mut status = self.status.lock().await;
        self.apply(&mut status, target).await
    }

    /// Terminal transition for a body that returned.
    ///
    /// A task whose cancellation was accepted ends `CANCELLED` whatever the
    /// body returned.
    pub(crate) async fn mark_finished(&self, succeeded: bool) -> TaskStatus {
        let mut status = self.status.lock().await;
        let target = match (*status, succeeded) {
            (TaskStatus::Cancelling, _) => TaskStatus::Cancelled,
            (_, true) => TaskStatus::Completed,
            (_, false) => TaskStatus::Failed,
        };
        self.apply(&mut status, target).await;
        *status
    }

    /// Terminal transition for a task that was cancelled before it started.
    pub(crate) async fn mark_cancelled(&self) {
        self.update_status(TaskStatus::Cancelled).await;
    }

    /// Store the computation's result.
    pub(crate) fn complete(&self, result: TaskResult) {
        *self.computation.lock().unwrap_or_else(|e| e.into_inner()) = Computation::Done(result);
    }

    /// Check if the computation has produced a result.
    pub fn is_done(&self) -> bool {
        matches!(
            *self.computation.lock().unwrap_or_else(|e| e.into_inner()),
            Computation::Done(_)
        )
    }

    /// The stored result, if the computation finished.
    pub fn result(&self) -> Option<TaskResult> {
        match &*self.computation.lock().unwrap_or_else(|e| e.into_inner()) {
            Computation::Done(result) => Some(result.clone()),
            Computation::Pending => None,
        }
    }

    /// Forward the result on the result channel, but only if the computation
    /// finished and was not cancelled. Returns whether a result was sent.
    pub async fn send_result_if_done(&self) -> bool {
        if matches!(
            self.status().await,
            TaskStatus::Cancelling | TaskStatus::Cancelled
        ) {
            return false;
        }

        let Some(result) = self.result() else {
            return false;
        };

        if let Err(e) = self.channels.results.send(result).await {
            // The task still completed; only its reporting failed.
            tracing::error!(
                task_id = %self.task_id,
                channel = self.channels.results.name(),
                "Failed to deliver task result: {}", e
            );
        }
        true
    }

    /// Transition under the status lock and publish while still holding it.
    async fn apply(&self, status: &mut TaskStatus, target: TaskStatus) -> bool {
        let current = *status;
        if !current.can_transition_to(target) {
            tracing::warn!(
                task_id = %self.task_id,
                from = %current,
                to = %target,
                "Refused illegal status transition"
            );
            return false;
        }

        *status = target;
        tracing::debug!(task_id = %self.task_id, from = %current, to = %target, "Status changed");
        self.publish_status(target).await;
        true
    }

    async fn publish_status(&self, status: TaskStatus) {
        if let Err(e) = self
            .channels
            .status
            .send(TaskStatusUpdate::now(&self.task_id, status))
            .await
        {
            tracing::warn!(
                task_id = %self.task_id,
                channel = self.channels.status.name(),
                status = %status,
                "Failed to deliver status update: {}", e
            );
        }
    }
}

#[async_trait]
impl TaskLifecycle for SubmittedTaskHandle {
    async fn on_start(&self, _task_id: &str) {
        self.update_status(TaskStatus::Running).await;
    }

    async fn on_finish(&self, _task_id: &str, _payload: &serde_json::Value) {
        self.mark_finished(true).await;
    }

    async fn on_failure(&self, _task_id: &str, _error: &TaskError) {
        self.mark_finished(false).await;
    }
}

impl std::fmt::Debug for SubmittedTaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmittedTaskHandle")
            .field("task_id", &self.task_id)
            .field("task_type", &self.task_type)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
