//! # System Constants
//!
//! Core constants and enums that define the operational boundaries of the hub:
//! device status values, liveness timing, component names and the fixed
//! acknowledgement strings exposed to clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default number of shards in a [`ShardedStore`](crate::store::ShardedStore)
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// A device whose last heartbeat is older than this is considered offline
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thread name of the router worker
pub const DEFAULT_WORKER_NAME: &str = "iot-router-worker";

/// Default TCP bind address of the device service
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:50051";

/// Longest request line the device gateway buffers, newline excluded
pub const MAX_REQUEST_LINE_BYTES: usize = 64 * 1024;

/// Names under which built-in components are registered
pub mod components {
    pub const DEFAULT: &str = "default";
    pub const MOCK: &str = "mock";
}

/// Fixed messages returned to clients
pub mod acks {
    pub const COMMAND_ACCEPTED: &str = "Command accepted";
    pub const STATUS_RECEIVED: &str = "Status received";
    pub const ALIVE: &str = "Alive";
    pub const AUTH_FAILED: &str = "Auth failed";
    pub const MALFORMED_REQUEST: &str = "Malformed request";

    pub const CODE_OK: u32 = 0;
    pub const CODE_FAILED: u32 = 1;
}

/// Liveness state of a registered device.
///
/// Devices that were never registered have no status at all; `Unknown` is the
/// value a record carries before anything has been decided about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Online,
    Offline,
    Error,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_status_display_and_serde() {
        assert_eq!(DeviceStatus::Online.to_string(), "online");
        assert_eq!(DeviceStatus::default(), DeviceStatus::Unknown);

        let json = serde_json::to_string(&DeviceStatus::Offline).unwrap();
        assert_eq!(json, "\"offline\"");
        let parsed: DeviceStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, DeviceStatus::Error);
    }
}
