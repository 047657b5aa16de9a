//! # Execution Pipeline
//!
//! Multi-producer / single-consumer pipeline that serializes all business
//! logic onto one dedicated thread.
//!
//! ```text
//! producer threads ──push──▶ TaskChannel ──pop──▶ Worker thread ──▶ job()
//! ```

pub mod channel;
pub mod worker;

pub use channel::{ChannelCapacity, ChannelStats, OverflowPolicy, PushError, TaskChannel};
pub use worker::{Job, TaskSender, Worker, WorkerError, WorkerStats};
