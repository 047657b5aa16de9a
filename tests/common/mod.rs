//! Shared fixtures for integration tests
#![allow(dead_code)]

pub mod strategies;

use iot_hub::config::WorkerConfig;
use iot_hub::device::{DefaultDeviceRegistry, DeviceRegistry, ManualClock};
use iot_hub::message::MessageRouter;
use iot_hub::user::{MockUserValidator, UserCredentials, UserValidator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SYNC_TIMEOUT: Duration = Duration::from_secs(5);
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry on a manual clock with the standard 30s timeout
pub fn manual_registry() -> (Arc<DefaultDeviceRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let registry = Arc::new(DefaultDeviceRegistry::with_clock(
        16,
        HEARTBEAT_TIMEOUT,
        clock.clone(),
    ));
    (registry, clock)
}

/// Accepts only the given token
#[derive(Debug)]
pub struct TokenValidator {
    pub accepted_token: String,
    pub calls: AtomicUsize,
}

impl TokenValidator {
    pub fn new(accepted_token: &str) -> Self {
        Self {
            accepted_token: accepted_token.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UserValidator for TokenValidator {
    fn validate_user(&self, credentials: &UserCredentials) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        credentials.token == self.accepted_token
    }
}

pub fn router_with(
    devices: Arc<dyn DeviceRegistry>,
    validator: Arc<dyn UserValidator>,
) -> MessageRouter {
    MessageRouter::new(devices, validator, &WorkerConfig::default())
        .expect("router should start")
}

/// Router over a fresh default registry that accepts every user
pub fn permissive_router() -> MessageRouter {
    router_with(
        Arc::new(DefaultDeviceRegistry::new()),
        Arc::new(MockUserValidator),
    )
}
