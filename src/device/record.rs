use std::time::Instant;

use crate::constants::DeviceStatus;

/// State held for one registered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub status: DeviceStatus,
    /// Free-form text from the most recent status report
    pub last_status_report: String,
    /// Monotonic time of the last heartbeat, registration or status report
    pub last_heartbeat: Instant,
}

impl DeviceRecord {
    /// A freshly registered device: online, no report yet
    pub fn registered_at(now: Instant) -> Self {
        Self {
            status: DeviceStatus::Online,
            last_status_report: String::new(),
            last_heartbeat: now,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}
