//! Task model: commands, results, status, and the resolver.
//!
//! Core components:
//! - `command`: `TaskCommand` and the caller identity it carries
//! - `status`: Handle status state machine (Pending → Running → Completed/Failed)
//! - `result`: `TaskResult`, status and progress messages
//! - `task`: The `Task` trait and the `TaskContext` handed to task bodies
//! - `resolver`: Maps a command's task type to a fresh `Task`

pub mod command;
pub mod resolver;
pub mod result;
pub mod status;
pub mod task;

pub use command::{CallerContext, TaskCommand};
pub use resolver::TaskResolver;
pub use result::{ProgressUpdate, TaskResult, TaskStatusUpdate};
pub use status::TaskStatus;
pub use task::{Task, TaskContext};
