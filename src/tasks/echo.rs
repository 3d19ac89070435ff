//! `echo`: reports the given progress lines and returns the given payload.
//!
//! Params: `{"progress": "line" | ["line", ...], "payload": <any>}`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::task::{Task, TaskCommand, TaskContext};

pub const TASK_TYPE: &str = "echo";

pub struct EchoTask {
    params: Value,
}

impl EchoTask {
    pub fn from_command(command: &TaskCommand) -> Self {
        Self {
            params: command.params.clone(),
        }
    }

    fn progress_lines(&self) -> Result<Vec<String>, TaskError> {
        match self.params.get("progress") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(line)) => Ok(vec![line.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        TaskError::InvalidParameters(format!(
                            "progress entries must be strings, got {item}"
                        ))
                    })
                })
                .collect(),
            Some(other) => Err(TaskError::InvalidParameters(format!(
                "progress must be a string or a list, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl Task for EchoTask {
    async fn execute(self: Box<Self>, ctx: &TaskContext) -> Result<Value, TaskError> {
        for line in self.progress_lines()? {
            ctx.check_cancelled()?;
            ctx.progress().info(line).await;
        }

        Ok(self.params.get("payload").cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(params: Value) -> EchoTask {
        EchoTask::from_command(&TaskCommand::with_id("e1", TASK_TYPE).with_params(params))
    }

    #[test]
    fn progress_accepts_string_or_list() {
        assert_eq!(
            echo(json!({"progress": "half done"})).progress_lines().unwrap(),
            vec!["half done"]
        );
        assert_eq!(
            echo(json!({"progress": ["a", "b"]})).progress_lines().unwrap(),
            vec!["a", "b"]
        );
        assert!(echo(json!({})).progress_lines().unwrap().is_empty());
    }

    #[test]
    fn bad_progress_is_rejected() {
        assert!(matches!(
            echo(json!({"progress": 7})).progress_lines(),
            Err(TaskError::InvalidParameters(_))
        ));
        assert!(matches!(
            echo(json!({"progress": ["ok", 1]})).progress_lines(),
            Err(TaskError::InvalidParameters(_))
        ));
    }
}
