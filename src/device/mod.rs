//! # Device Liveness
//!
//! Per-device state (`Unknown` → `Online` ⇄ `Offline`) and the capability
//! trait the router drives it through.
//!
//! A device exists only after `register`. Heartbeats and status reports keep
//! it online; once its last heartbeat is older than the timeout it is demoted
//! to offline, either lazily on the next `is_online` query or by the optional
//! [`LivenessSweeper`].

pub mod clock;
pub mod default_registry;
pub mod record;
pub mod registry;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use default_registry::DefaultDeviceRegistry;
pub use record::DeviceRecord;
pub use registry::DeviceRegistry;
pub use sweeper::LivenessSweeper;
