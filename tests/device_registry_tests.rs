mod common;

use common::manual_registry;
use iot_hub::device::{Clock, DefaultDeviceRegistry, DeviceRegistry};
use iot_hub::DeviceStatus;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_register_creates_online_record_with_fresh_timestamp() {
    let (registry, clock) = manual_registry();
    assert!(registry.register("d1"));

    let info = registry.get_info("d1").unwrap();
    assert_eq!(info.status, DeviceStatus::Online);
    assert_eq!(info.last_heartbeat, clock.now());
    assert!(registry.is_online("d1"));
}

#[test]
fn test_second_register_leaves_record_unchanged() {
    let (registry, clock) = manual_registry();
    registry.register("d1");
    registry.report_status("d1", "booting");
    let before = registry.get_info("d1").unwrap();

    clock.advance(Duration::from_secs(3));
    assert!(!registry.register("d1"));
    assert_eq!(registry.get_info("d1").unwrap(), before);
}

#[test]
fn test_device_expires_after_timeout() {
    let (registry, clock) = manual_registry();
    registry.register("d2");

    clock.advance(Duration::from_secs(31));
    assert!(!registry.is_online("d2"));
    assert_eq!(registry.get_info("d2").unwrap().status, DeviceStatus::Offline);
}

#[test]
fn test_get_info_does_not_expire() {
    let (registry, clock) = manual_registry();
    registry.register("d2");

    clock.advance(Duration::from_secs(31));
    assert_eq!(registry.get_info("d2").unwrap().status, DeviceStatus::Online);
}

#[test]
fn test_report_status_sets_text_and_revives() {
    let (registry, clock) = manual_registry();
    registry.register("d3");
    registry.mark_offline("d3");

    clock.advance(Duration::from_secs(45));
    registry.report_status("d3", "temp=28C");

    let info = registry.get_info("d3").unwrap();
    assert_eq!(info.last_status_report, "temp=28C");
    assert_eq!(info.status, DeviceStatus::Online);
    assert_eq!(info.last_heartbeat, clock.now());
    assert!(registry.is_online("d3"));
}

#[test]
fn test_mutations_on_unknown_device_do_not_create_it() {
    let (registry, _clock) = manual_registry();
    registry.heartbeat("ghost");
    registry.report_status("ghost", "hi");
    registry.mark_offline("ghost");

    assert!(registry.get_info("ghost").is_none());
    assert!(!registry.is_online("ghost"));
    assert_eq!(registry.device_count(), 0);
}

#[test]
fn test_concurrent_register_has_exactly_one_winner() {
    let registry = Arc::new(DefaultDeviceRegistry::new());
    let threads = 32;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.register("same-id")
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .filter_map(|h| h.join().ok())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(registry.device_count(), 1);
}

#[test]
fn test_sweep_matches_lazy_expiry() {
    let (registry, clock) = manual_registry();
    for id in ["a", "b", "c"] {
        registry.register(id);
    }
    clock.advance(Duration::from_secs(20));
    registry.heartbeat("c");
    clock.advance(Duration::from_secs(15));

    assert_eq!(registry.sweep_expired(), 2);
    assert!(!registry.is_online("a"));
    assert!(!registry.is_online("b"));
    assert!(registry.is_online("c"));
}
