//! Queue listeners that drive a shared `TaskRunner`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::request::ControlMessage;
use crate::error::TaskError;
use crate::runner::TaskRunner;
use crate::task::{TaskCommand, TaskResult};

/// Submit every command received on `rx`.
///
/// A rejected command never gets a handle, so the rejection is reported as a
/// failed result on the runner's results channel instead.
pub fn spawn_submission_listener(
    runner: Arc<TaskRunner>,
    mut rx: mpsc::UnboundedReceiver<TaskCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let task_id = command.id.clone();
            if let Err(e) = runner.submit(command) {
                tracing::warn!(task_id = %task_id, "Submission rejected: {}", e);
                let result = TaskResult::failure(&task_id, &TaskError::failed(e.to_string()));
                if let Err(e) = runner.channels().results.send(result).await {
                    tracing::error!(task_id = %task_id, "Failed to report rejection: {}", e);
                }
            }
        }
        tracing::debug!("Submission listener stopped");
    })
}

/// Apply control messages received on `rx`.
pub fn spawn_control_listener(
    runner: Arc<TaskRunner>,
    mut rx: mpsc::UnboundedReceiver<ControlMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                ControlMessage::Cancel { task_id } => {
                    let accepted = runner.request_cancellation(&task_id).await;
                    tracing::info!(task_id = %task_id, accepted, "Cancellation request handled");
                }
            }
        }
        tracing::debug!("Control listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::TaskChannels;
    use crate::config::RunnerConfig;
    use crate::task::{TaskResolver, TaskStatus};
    use std::time::Duration;

    fn runner() -> (Arc<TaskRunner>, crate::channels::TaskReceivers) {
        let resolver = Arc::new(TaskResolver::new());
        crate::tasks::register_builtin(&resolver);
        let (channels, rx) = TaskChannels::unbounded();
        let config = RunnerConfig {
            min_workers: 1,
            max_workers: 2,
            ..Default::default()
        };
        (
            Arc::new(TaskRunner::new(config, resolver, channels).unwrap()),
            rx,
        )
    }

    #[tokio::test]
    async fn rejection_is_reported_as_failed_result() {
        let (runner, mut rx) = runner();
        let (tx, sub_rx) = mpsc::unbounded_channel();
        let listener = spawn_submission_listener(runner, sub_rx);

        tx.send(TaskCommand::with_id("bad", "no-such-type")).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), rx.results.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.task_id, "bad");
        assert!(result.payload.is_none());
        assert!(result.error.unwrap().contains("no-such-type"));

        drop(tx);
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn control_cancel_reaches_running_task() {
        let (runner, mut rx) = runner();
        let (sub_tx, sub_rx) = mpsc::unbounded_channel();
        let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
        spawn_submission_listener(Arc::clone(&runner), sub_rx);
        spawn_control_listener(Arc::clone(&runner), ctl_rx);

        sub_tx
            .send(
                TaskCommand::with_id("long", "sleep")
                    .with_params(serde_json::json!({"millis": 60_000})),
            )
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.status.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.status, TaskStatus::Running);

        ctl_tx
            .send(ControlMessage::Cancel {
                task_id: "long".into(),
            })
            .unwrap();

        let mut statuses = Vec::new();
        while let Ok(Some(update)) =
            tokio::time::timeout(Duration::from_secs(5), rx.status.recv()).await
        {
            statuses.push(update.status);
            if update.status.is_terminal() {
                break;
            }
        }
        assert_eq!(statuses, vec![TaskStatus::Cancelling, TaskStatus::Cancelled]);
        assert!(rx.results.try_recv().is_err());
    }
}
