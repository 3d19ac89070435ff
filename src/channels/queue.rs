//! Queue channel: routes each message to its per-task destination.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::channel::{Channel, TaskChannels};
use crate::config::QueueConfig;
use crate::error::ChannelError;
use crate::task::{ProgressUpdate, TaskResult, TaskStatusUpdate};

/// A serialized message addressed to a named destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub destination: String,
    pub body: serde_json::Value,
}

/// Serializes messages into envelopes addressed by `QueueConfig` prefixes.
#[derive(Clone)]
pub struct QueueChannel {
    queues: QueueConfig,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl QueueChannel {
    pub fn new(queues: QueueConfig, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { queues, tx }
    }

    /// Use this queue channel for results, status and progress alike.
    pub fn into_task_channels(self) -> TaskChannels {
        let shared = Arc::new(self);
        TaskChannels::new(shared.clone(), shared.clone(), shared)
    }

    fn post<T: Serialize>(&self, destination: String, value: &T) -> Result<(), ChannelError> {
        let body = serde_json::to_value(value).map_err(|e| ChannelError::SendFailed {
            name: destination.clone(),
            reason: format!("serialization failed: {e}"),
        })?;

        self.tx
            .send(Envelope {
                destination: destination.clone(),
                body,
            })
            .map_err(|_| ChannelError::Closed { name: destination })
    }
}

#[async_trait]
impl Channel<TaskResult> for QueueChannel {
    fn name(&self) -> &str {
        &self.queues.result_queue_prefix
    }

    async fn send(&self, value: TaskResult) -> Result<(), ChannelError> {
        self.post(self.queues.result_queue(&value.task_id), &value)
    }
}

#[async_trait]
impl Channel<TaskStatusUpdate> for QueueChannel {
    fn name(&self) -> &str {
        &self.queues.lifecycle_queue_prefix
    }

    async fn send(&self, value: TaskStatusUpdate) -> Result<(), ChannelError> {
        self.post(self.queues.lifecycle_queue(&value.task_id), &value)
    }
}

#[async_trait]
impl Channel<ProgressUpdate> for QueueChannel {
    fn name(&self) -> &str {
        &self.queues.progress_queue_prefix
    }

    async fn send(&self, value: ProgressUpdate) -> Result<(), ChannelError> {
        self.post(self.queues.progress_queue(&value.task_id), &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[tokio::test]
    async fn routes_by_task_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channels = QueueChannel::new(QueueConfig::default(), tx).into_task_channels();

        channels
            .status
            .send(TaskStatusUpdate::now("t1", TaskStatus::Running))
            .await
            .unwrap();
        channels
            .results
            .send(TaskResult::success("t2", serde_json::json!(42)))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.destination, "tasks.lifecycle.t1");
        assert_eq!(first.body["status"], "RUNNING");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.destination, "tasks.result.t2");
        assert_eq!(second.body["payload"], 42);
    }

    #[test]
    fn names_follow_queue_prefixes() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let channels = QueueChannel::new(QueueConfig::default(), tx).into_task_channels();

        assert_eq!(channels.results.name(), "tasks.result.");
        assert_eq!(channels.status.name(), "tasks.lifecycle.");
        assert_eq!(channels.progress.name(), "tasks.progress.");
    }
}
