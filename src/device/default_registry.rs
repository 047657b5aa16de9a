use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{Clock, DeviceRecord, DeviceRegistry, SystemClock};
use crate::constants::{DeviceStatus, DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_SHARD_COUNT};
use crate::store::ShardedStore;

/// [`DeviceRegistry`] backed by a [`ShardedStore`].
///
/// Every mutation goes through one of the store's single-critical-section
/// primitives, so concurrent writers never lose updates.
pub struct DefaultDeviceRegistry {
    devices: ShardedStore<String, DeviceRecord>,
    heartbeat_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl DefaultDeviceRegistry {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_SHARD_COUNT, DEFAULT_HEARTBEAT_TIMEOUT)
    }

    pub fn with_settings(shard_count: usize, heartbeat_timeout: Duration) -> Self {
        Self::with_clock(shard_count, heartbeat_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(shard_count: usize, heartbeat_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            devices: ShardedStore::with_shards(shard_count),
            heartbeat_timeout,
            clock,
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    fn expired(&self, record: &DeviceRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.last_heartbeat) > self.heartbeat_timeout
    }
}

impl Default for DefaultDeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultDeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultDeviceRegistry")
            .field("devices", &self.devices.len())
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .finish()
    }
}

impl DeviceRegistry for DefaultDeviceRegistry {
    fn register(&self, device_id: &str) -> bool {
        let inserted = self
            .devices
            .put_if_absent(device_id.to_string(), DeviceRecord::registered_at(self.clock.now()));

        if inserted {
            debug!(device_id = %device_id, "Device registered");
        } else {
            debug!(device_id = %device_id, "Device already registered");
        }
        inserted
    }

    fn heartbeat(&self, device_id: &str) {
        let now = self.clock.now();
        let found = self.devices.update_if_present(&device_id.to_string(), |record| {
            record.status = DeviceStatus::Online;
            record.last_heartbeat = now;
        });

        if !found {
            debug!(device_id = %device_id, "Heartbeat for unknown device ignored");
        }
    }

    fn mark_offline(&self, device_id: &str) {
        let found = self.devices.update_if_present(&device_id.to_string(), |record| {
            record.status = DeviceStatus::Offline;
        });

        if found {
            debug!(device_id = %device_id, "Device marked offline");
        } else {
            debug!(device_id = %device_id, "Offline mark for unknown device ignored");
        }
    }

    fn report_status(&self, device_id: &str, status: &str) {
        let now = self.clock.now();
        let found = self.devices.update_if_present(&device_id.to_string(), |record| {
            record.last_status_report = status.to_string();
            record.status = DeviceStatus::Online;
            record.last_heartbeat = now;
        });

        if !found {
            debug!(device_id = %device_id, "Status report for unknown device ignored");
        }
    }

    fn is_online(&self, device_id: &str) -> bool {
        let now = self.clock.now();
        self.devices
            .compute_if_present(&device_id.to_string(), |record| {
                if self.expired(record, now) {
                    if record.status != DeviceStatus::Offline {
                        debug!(device_id = %device_id, "Heartbeat expired; device demoted to offline");
                    }
                    record.status = DeviceStatus::Offline;
                    false
                } else {
                    record.is_online()
                }
            })
            .unwrap_or(false)
    }

    fn get_info(&self, device_id: &str) -> Option<DeviceRecord> {
        self.devices.get(&device_id.to_string())
    }

    fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut demoted = 0;
        self.devices.update_all(|_, record| {
            if record.is_online() && self.expired(record, now) {
                record.status = DeviceStatus::Offline;
                demoted += 1;
            }
        });

        if demoted > 0 {
            debug!(demoted = demoted, "Liveness sweep demoted stale devices");
        }
        demoted
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ManualClock;

    fn registry_with_clock() -> (DefaultDeviceRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry = DefaultDeviceRegistry::with_clock(4, Duration::from_secs(30), clock.clone());
        (registry, clock)
    }

    #[test]
    fn test_register_once() {
        let (registry, clock) = registry_with_clock();
        assert!(registry.register("d1"));

        let info = registry.get_info("d1").unwrap();
        assert_eq!(info.status, DeviceStatus::Online);
        assert_eq!(info.last_status_report, "");
        assert_eq!(info.last_heartbeat, clock.now());

        clock.advance(Duration::from_secs(5));
        assert!(!registry.register("d1"));
        assert_eq!(registry.get_info("d1").unwrap(), info);
    }

    #[test]
    fn test_unknown_device_is_noop() {
        let (registry, _clock) = registry_with_clock();
        registry.heartbeat("ghost");
        registry.mark_offline("ghost");
        registry.report_status("ghost", "hello");

        assert!(!registry.is_online("ghost"));
        assert!(registry.get_info("ghost").is_none());
        assert_eq!(registry.device_count(), 0);
    }

    #[test]
    fn test_expiry_is_strictly_greater_than_timeout() {
        let (registry, clock) = registry_with_clock();
        registry.register("d2");

        clock.advance(Duration::from_secs(30));
        assert!(registry.is_online("d2"));

        clock.advance(Duration::from_millis(1));
        assert!(!registry.is_online("d2"));
        assert_eq!(registry.get_info("d2").unwrap().status, DeviceStatus::Offline);
    }

    #[test]
    fn test_heartbeat_revives_offline_device() {
        let (registry, clock) = registry_with_clock();
        registry.register("d5");
        registry.mark_offline("d5");
        assert!(!registry.is_online("d5"));

        clock.advance(Duration::from_secs(10));
        registry.heartbeat("d5");
        let info = registry.get_info("d5").unwrap();
        assert_eq!(info.status, DeviceStatus::Online);
        assert_eq!(info.last_heartbeat, clock.now());
    }

    #[test]
    fn test_sweep_only_demotes_stale_online_devices() {
        let (registry, clock) = registry_with_clock();
        registry.register("stale");
        registry.register("already-offline");
        registry.mark_offline("already-offline");

        clock.advance(Duration::from_secs(31));
        registry.register("fresh");

        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.get_info("stale").unwrap().status, DeviceStatus::Offline);
        assert_eq!(registry.get_info("fresh").unwrap().status, DeviceStatus::Online);
        assert_eq!(registry.sweep_expired(), 0);
    }
}
