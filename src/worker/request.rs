//! Inbound message types.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::task::TaskCommand;

/// Message consumed from the control queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMessage {
    Cancel { task_id: String },
}

/// One line of the worker's stdin: `{"submit": {...}}` or
/// `{"cancel": {"task_id": "..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRequest {
    Submit(TaskCommand),
    Cancel { task_id: String },
}

impl WorkerRequest {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Forward to the submission or control queue.
    ///
    /// Returns `false` once the receiving side has gone away.
    pub fn route(
        self,
        submissions: &mpsc::UnboundedSender<TaskCommand>,
        control: &mpsc::UnboundedSender<ControlMessage>,
    ) -> bool {
        match self {
            WorkerRequest::Submit(command) => submissions.send(command).is_ok(),
            WorkerRequest::Cancel { task_id } => {
                control.send(ControlMessage::Cancel { task_id }).is_ok()
            }
        }
    }
}
