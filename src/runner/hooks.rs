//! Post-completion hooks: best-effort continuations after a task finishes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::NotificationError;
use crate::task::{CallerContext, TaskResult};

/// Sends a completion notice to whoever submitted a task.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sender name for logging.
    fn name(&self) -> &str;

    /// Notify `caller` that a task finished. `progress` holds the task's
    /// latest progress lines, oldest first.
    async fn send(
        &self,
        caller: &CallerContext,
        result: &TaskResult,
        progress: &[String],
    ) -> Result<(), NotificationError>;
}

/// Continuations chained onto task completion.
///
/// Hooks run on their own tokio task, never on a pool worker, and their
/// failures are logged and swallowed.
#[derive(Clone, Default)]
pub struct PostCompletionHooks {
    notifier: Option<Arc<dyn NotificationSender>>,
}

impl PostCompletionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    /// Spawn the completion notification for one finished task.
    ///
    /// Returns `None` when no notifier is configured.
    pub fn attach_notification(
        &self,
        caller: CallerContext,
        result: TaskResult,
        progress: Vec<String>,
    ) -> Option<JoinHandle<()>> {
        let Some(notifier) = self.notifier.clone() else {
            tracing::debug!(
                task_id = %result.task_id,
                "Notification requested but no notifier configured"
            );
            return None;
        };

        Some(tokio::spawn(async move {
            match notifier.send(&caller, &result, &progress).await {
                Ok(()) => tracing::debug!(
                    task_id = %result.task_id,
                    notifier = notifier.name(),
                    "Completion notification sent"
                ),
                Err(e) => tracing::warn!(
                    task_id = %result.task_id,
                    notifier = notifier.name(),
                    "Failed to send completion notification: {}", e
                ),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(Option<String>, TaskResult, Vec<String>)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(
            &self,
            caller: &CallerContext,
            result: &TaskResult,
            progress: &[String],
        ) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push((
                caller.principal.clone(),
                result.clone(),
                progress.to_vec(),
            ));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl NotificationSender for FailingNotifier {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(
            &self,
            _caller: &CallerContext,
            result: &TaskResult,
            _progress: &[String],
        ) -> Result<(), NotificationError> {
            Err(NotificationError::NoRecipient {
                task_id: result.task_id.clone(),
            })
        }
    }

    #[tokio::test]
    async fn notification_runs_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let hooks = PostCompletionHooks::new().with_notifier(notifier.clone());

        let handle = hooks
            .attach_notification(
                CallerContext::user("carol"),
                TaskResult::success("n1", serde_json::json!(1)),
                vec!["step 1".to_string()],
            )
            .unwrap();
        handle.await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.as_deref(), Some("carol"));
        assert_eq!(sent[0].2, vec!["step 1".to_string()]);
    }

    #[tokio::test]
    async fn notifier_failure_is_swallowed() {
        let hooks = PostCompletionHooks::new().with_notifier(Arc::new(FailingNotifier));
        let handle = hooks
            .attach_notification(
                CallerContext::anonymous(),
                TaskResult::success("n2", serde_json::Value::Null),
                Vec::new(),
            )
            .unwrap();

        // The hook task completes normally even though sending failed.
        assert!(handle.await.is_ok());
    }

    #[test]
    fn no_notifier_no_hook() {
        let hooks = PostCompletionHooks::new();
        assert!(!hooks.has_notifier());
        assert!(hooks
            .attach_notification(
                CallerContext::anonymous(),
                TaskResult::success("n3", serde_json::Value::Null),
                Vec::new(),
            )
            .is_none());
    }
}
