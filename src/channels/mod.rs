//! Delivery channels for task results, status transitions and progress.
//!
//! The runner only ever calls `send`; transport, retries and
//! acknowledgement belong to the channel implementation.

pub mod channel;
pub mod queue;

pub use channel::{Channel, TaskChannels, TaskReceivers};
pub use queue::{Envelope, QueueChannel};
