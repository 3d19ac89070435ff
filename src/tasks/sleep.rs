//! `sleep`: waits `params.millis` milliseconds, or until cancelled.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::task::{Task, TaskCommand, TaskContext};

pub const TASK_TYPE: &str = "sleep";

const DEFAULT_MILLIS: u64 = 1000;

pub struct SleepTask {
    millis: Option<Value>,
}

impl SleepTask {
    pub fn from_command(command: &TaskCommand) -> Self {
        Self {
            millis: command.params.get("millis").cloned(),
        }
    }

    fn duration(&self) -> Result<Duration, TaskError> {
        match &self.millis {
            None | Some(Value::Null) => Ok(Duration::from_millis(DEFAULT_MILLIS)),
            Some(value) => value.as_u64().map(Duration::from_millis).ok_or_else(|| {
                TaskError::InvalidParameters(format!(
                    "millis must be a non-negative integer, got {value}"
                ))
            }),
        }
    }
}

#[async_trait]
impl Task for SleepTask {
    async fn execute(self: Box<Self>, ctx: &TaskContext) -> Result<Value, TaskError> {
        let duration = self.duration()?;
        ctx.progress()
            .info(format!("sleeping for {} ms", duration.as_millis()))
            .await;

        if let Err(e) = ctx.sleep(duration).await {
            ctx.progress().warn("interrupted").await;
            return Err(e);
        }

        Ok(serde_json::json!({ "slept_ms": duration.as_millis() as u64 }))
    }
}
