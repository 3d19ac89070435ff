//! Task execution: the runner, its worker pool, and per-task bookkeeping.
//!
//! A submitted command is resolved to a task, wrapped in an `ExecutingTask`
//! and queued on the `WorkerPool`. The `SubmittedTaskHandle` is the task's
//! public face: status transitions, progress lines, cancellation and the
//! final result all flow through it to the configured `TaskChannels`.

mod executing;
mod guard;
mod handle;
mod hooks;
mod pool;
mod progress;
mod registry;
mod runner;

pub use executing::{ExecutingTask, Execution, ExecutionState, TaskLifecycle};
pub use handle::SubmittedTaskHandle;
pub use hooks::{NotificationSender, PostCompletionHooks};
pub use pool::{Job, WorkerPool};
pub use progress::{ProgressCapture, ProgressReporter};
pub use registry::TaskRegistry;
pub use runner::TaskRunner;
