use super::DeviceRecord;

/// Device liveness and status capability.
///
/// Mutations on an unknown device are silent no-ops; queries on an unknown
/// device answer `false` / `None`. Implementations must be safe to call from
/// any thread.
pub trait DeviceRegistry: Send + Sync {
    /// Create an online record for `device_id`. Returns false, leaving the
    /// existing record untouched, if the device is already known.
    fn register(&self, device_id: &str) -> bool;

    /// Mark the device online and refresh its heartbeat time
    fn heartbeat(&self, device_id: &str);

    fn mark_offline(&self, device_id: &str);

    /// Store `status` as the latest report; also counts as a heartbeat
    fn report_status(&self, device_id: &str, status: &str);

    /// Whether the device is online, demoting it first if its heartbeat has
    /// expired
    fn is_online(&self, device_id: &str) -> bool;

    /// Snapshot of the current record
    fn get_info(&self, device_id: &str) -> Option<DeviceRecord>;

    /// Demote every online device whose heartbeat has expired; returns how
    /// many were demoted
    fn sweep_expired(&self) -> usize;

    fn device_count(&self) -> usize;
}
