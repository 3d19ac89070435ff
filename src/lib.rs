//! Task worker: runs submitted tasks on a bounded pool and reports their
//! lifecycle, progress and results over outbound channels.

pub mod channels;
pub mod config;
pub mod error;
pub mod notify;
pub mod runner;
pub mod task;
pub mod tasks;
pub mod worker;
