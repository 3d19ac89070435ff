//! Built-in task types shipped with the worker.

pub mod echo;
pub mod sleep;

use crate::task::TaskResolver;

pub use echo::EchoTask;
pub use sleep::SleepTask;

/// Register every built-in task type on `resolver`.
pub fn register_builtin(resolver: &TaskResolver) {
    resolver.register(echo::TASK_TYPE, EchoTask::from_command);
    resolver.register(sleep::TASK_TYPE, SleepTask::from_command);
}
