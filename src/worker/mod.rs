//! Worker process surface: feeds inbound queues into a `TaskRunner`.
//!
//! - `listener`: submission and control listeners
//! - `request`: wire format of inbound messages

pub mod listener;
pub mod request;

pub use listener::{spawn_control_listener, spawn_submission_listener};
pub use request::{ControlMessage, WorkerRequest};
