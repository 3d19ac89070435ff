//! Progress capture: a per-task sink that is only open while its task runs.
//!
//! Task bodies report through the `ProgressReporter` on their `TaskContext`.
//! Every reporter is bound to exactly one task id, so concurrent tasks can
//! never write into each other's progress stream. Messages below `INFO`
//! are logged but not forwarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;

use super::handle::SubmittedTaskHandle;

struct CaptureState {
    task_id: String,
    active: AtomicBool,
    handle: Option<Arc<SubmittedTaskHandle>>,
}

/// Owner side of a task's progress stream.
pub struct ProgressCapture {
    state: Arc<CaptureState>,
}

impl ProgressCapture {
    /// Capture that forwards into `handle`.
    pub fn new(handle: Arc<SubmittedTaskHandle>) -> Self {
        Self {
            state: Arc::new(CaptureState {
                task_id: handle.task_id().to_string(),
                active: AtomicBool::new(false),
                handle: Some(handle),
            }),
        }
    }

    /// Capture that only logs.
    pub fn detached(task_id: impl Into<String>) -> Self {
        Self {
            state: Arc::new(CaptureState {
                task_id: task_id.into(),
                active: AtomicBool::new(false),
                handle: None,
            }),
        }
    }

    /// Start forwarding. Idempotent.
    pub fn initialize(&self) {
        if !self.state.active.swap(true, Ordering::AcqRel) {
            tracing::debug!(task_id = %self.state.task_id, "Progress capture started");
        }
    }

    /// Stop forwarding. Idempotent.
    pub fn tear_down(&self) {
        if self.state.active.swap(false, Ordering::AcqRel) {
            tracing::debug!(task_id = %self.state.task_id, "Progress capture stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// Reporter handed to the task body.
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter {
            state: Arc::clone(&self.state),
        }
    }
}

/// Task-side handle for reporting progress.
#[derive(Clone)]
pub struct ProgressReporter {
    state: Arc<CaptureState>,
}

impl ProgressReporter {
    /// An always-open reporter that only logs.
    pub fn detached(task_id: impl Into<String>) -> Self {
        let capture = ProgressCapture::detached(task_id);
        capture.initialize();
        capture.reporter()
    }

    pub fn task_id(&self) -> &str {
        &self.state.task_id
    }

    pub async fn debug(&self, message: impl Into<String>) {
        self.report(Level::DEBUG, message).await
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.report(Level::INFO, message).await
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.report(Level::WARN, message).await
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.report(Level::ERROR, message).await
    }

    /// Log `message` and forward it if it is at least `INFO`.
    pub async fn report(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        let task_id = self.state.task_id.as_str();

        if level == Level::ERROR {
            tracing::error!(task_id, "{message}");
        } else if level == Level::WARN {
            tracing::warn!(task_id, "{message}");
        } else if level == Level::INFO {
            tracing::info!(task_id, "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(task_id, "{message}");
        } else {
            tracing::trace!(task_id, "{message}");
        }

        // Level ordering: more verbose compares greater.
        if level > Level::INFO {
            return;
        }

        if !self.state.active.load(Ordering::Acquire) {
            tracing::debug!(task_id, "Progress capture closed, dropping update");
            return;
        }

        if let Some(handle) = &self.state.handle {
            handle.add_progress_update(message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::TaskChannels;
    use crate::task::TaskCommand;

    fn handle_with_receivers() -> (
        Arc<SubmittedTaskHandle>,
        crate::channels::TaskReceivers,
    ) {
        let (channels, rx) = TaskChannels::unbounded();
        let command = TaskCommand::with_id("p1", "echo");
        (Arc::new(SubmittedTaskHandle::new(&command, channels, 10)), rx)
    }

    #[tokio::test]
    async fn forwards_only_while_active() {
        let (handle, mut rx) = handle_with_receivers();
        let capture = ProgressCapture::new(Arc::clone(&handle));
        let reporter = capture.reporter();

        reporter.info("before").await;
        capture.initialize();
        reporter.info("during").await;
        capture.tear_down();
        reporter.info("after").await;

        assert_eq!(rx.progress.recv().await.unwrap().message, "during");
        assert!(rx.progress.try_recv().is_err());
        assert_eq!(handle.recent_progress(), vec!["during".to_string()]);
    }

    #[tokio::test]
    async fn filters_below_info() {
        let (handle, mut rx) = handle_with_receivers();
        let capture = ProgressCapture::new(Arc::clone(&handle));
        capture.initialize();

        let reporter = capture.reporter();
        reporter.debug("noise").await;
        reporter.warn("careful").await;

        assert_eq!(rx.progress.recv().await.unwrap().message, "careful");
        assert!(rx.progress.try_recv().is_err());
    }

    #[test]
    fn initialize_and_tear_down_are_idempotent() {
        let capture = ProgressCapture::detached("p2");
        capture.initialize();
        capture.initialize();
        assert!(capture.is_active());
        capture.tear_down();
        capture.tear_down();
        assert!(!capture.is_active());
    }
}
