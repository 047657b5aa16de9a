//! # Message Routing
//!
//! Turns inbound events into [`MessageTask`]s and runs them on the router
//! worker, where the caller is validated and the device registry updated.

pub mod router;
pub mod task;

pub use router::{MessageRouter, RouterStats};
pub use task::{MessageKind, MessageTask};
