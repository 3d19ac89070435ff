//! The `Channel` trait and the result/status/progress bundle.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::ChannelError;
use crate::task::{ProgressUpdate, TaskResult, TaskStatusUpdate};

/// A one-way, fire-and-forget delivery mechanism.
#[async_trait]
pub trait Channel<T: Send + 'static>: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str {
        "channel"
    }

    /// Deliver one value.
    async fn send(&self, value: T) -> Result<(), ChannelError>;
}

#[async_trait]
impl<T: Send + 'static> Channel<T> for mpsc::UnboundedSender<T> {
    fn name(&self) -> &str {
        "mpsc"
    }

    async fn send(&self, value: T) -> Result<(), ChannelError> {
        mpsc::UnboundedSender::send(self, value).map_err(|_| ChannelError::Closed {
            name: "mpsc".to_string(),
        })
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> Channel<T> for broadcast::Sender<T> {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn send(&self, value: T) -> Result<(), ChannelError> {
        // Ok if no receivers are listening yet
        let _ = broadcast::Sender::send(self, value);
        Ok(())
    }
}

/// The three outbound channels a runner reports through.
#[derive(Clone)]
pub struct TaskChannels {
    pub results: Arc<dyn Channel<TaskResult>>,
    pub status: Arc<dyn Channel<TaskStatusUpdate>>,
    pub progress: Arc<dyn Channel<ProgressUpdate>>,
}

/// Receiving ends of `TaskChannels::unbounded`.
pub struct TaskReceivers {
    pub results: mpsc::UnboundedReceiver<TaskResult>,
    pub status: mpsc::UnboundedReceiver<TaskStatusUpdate>,
    pub progress: mpsc::UnboundedReceiver<ProgressUpdate>,
}

impl TaskChannels {
    pub fn new(
        results: Arc<dyn Channel<TaskResult>>,
        status: Arc<dyn Channel<TaskStatusUpdate>>,
        progress: Arc<dyn Channel<ProgressUpdate>>,
    ) -> Self {
        Self {
            results,
            status,
            progress,
        }
    }

    /// In-process channels backed by unbounded mpsc queues.
    pub fn unbounded() -> (Self, TaskReceivers) {
        let (results_tx, results) = mpsc::unbounded_channel();
        let (status_tx, status) = mpsc::unbounded_channel();
        let (progress_tx, progress) = mpsc::unbounded_channel();

        let channels = Self::new(
            Arc::new(results_tx),
            Arc::new(status_tx),
            Arc::new(progress_tx),
        );

        (
            channels,
            TaskReceivers {
                results,
                status,
                progress,
            },
        )
    }
}
