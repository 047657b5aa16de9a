//! Message Router
//!
//! Every inbound event is wrapped in a [`MessageTask`] and submitted to a
//! dedicated [`Worker`]. The caller gets its acknowledgement as soon as the
//! task is queued, before validation or any state change has happened. All
//! device mutations therefore run on one thread, in submission order.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::task::{MessageKind, MessageTask};
use crate::config::{IotConfig, WorkerConfig};
use crate::constants::acks;
use crate::device::DeviceRegistry;
use crate::error::Result;
use crate::execution::{TaskSender, Worker, WorkerError, WorkerStats};
use crate::logging::{log_device_operation, log_error, log_task_operation};
use crate::registry::Components;
use crate::user::{UserCredentials, UserValidator};

/// Counters describing what the router has done so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Tasks accepted by the worker channel
    pub enqueued: u64,
    /// Events that never reached the channel
    pub dropped: u64,
    /// Tasks discarded because the caller failed validation
    pub rejected_validations: u64,
    /// Tasks that passed validation and were applied
    pub processed: u64,
}

#[derive(Debug, Default)]
struct RouterCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    rejected_validations: AtomicU64,
    processed: AtomicU64,
}

impl RouterCounters {
    fn snapshot(&self) -> RouterStats {
        RouterStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected_validations: self.rejected_validations.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

/// Task body executed on the worker thread
#[derive(Clone)]
struct TaskProcessor {
    devices: Arc<dyn DeviceRegistry>,
    validator: Arc<dyn UserValidator>,
    counters: Arc<RouterCounters>,
}

impl TaskProcessor {
    fn process(&self, task: MessageTask) {
        if task.kind.requires_validation() && !self.validator.validate_user(&task.credentials) {
            self.counters
                .rejected_validations
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                kind = %task.kind,
                device_id = %task.device_id,
                user_id = %task.credentials.user_id,
                "User validation failed; task dropped"
            );
            return;
        }

        match task.kind {
            MessageKind::Command => {
                if !self.devices.is_online(&task.device_id) {
                    self.devices.register(&task.device_id);
                }
                log_task_operation(
                    "dispatch_command",
                    task.kind.as_str(),
                    &task.device_id,
                    Some(&task.credentials.user_id),
                    "dispatched",
                );
                debug!(device_id = %task.device_id, command = %task.payload, "Command dispatched");
            }
            MessageKind::StatusReport => {
                self.devices.report_status(&task.device_id, &task.payload);
            }
            MessageKind::Heartbeat => {
                self.devices.heartbeat(&task.device_id);
            }
            MessageKind::Disconnect => {
                self.devices.mark_offline(&task.device_id);
                log_device_operation("disconnect", &task.device_id, "offline", None);
            }
        }

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Entry point for device and user events
pub struct MessageRouter {
    worker: Worker,
    sender: TaskSender,
    processor: TaskProcessor,
}

impl MessageRouter {
    /// Build a router over the given capabilities and start its worker
    pub fn new(
        devices: Arc<dyn DeviceRegistry>,
        validator: Arc<dyn UserValidator>,
        worker_config: &WorkerConfig,
    ) -> std::result::Result<Self, WorkerError> {
        let worker = Worker::from_config(worker_config);
        worker.start()?;
        let sender = worker.sender();

        info!(worker = %worker.name(), "Message router started");
        Ok(Self {
            worker,
            sender,
            processor: TaskProcessor {
                devices,
                validator,
                counters: Arc::new(RouterCounters::default()),
            },
        })
    }

    /// Resolve the capabilities named under `[components]` and start the router
    pub fn from_components(components: &Components, config: &IotConfig) -> Result<Self> {
        let devices = components.resolve_device_registry(&config.components.device_registry)?;
        let validator = components.resolve_user_validator(&config.components.user_validator)?;

        info!(
            device_registry = %config.components.device_registry,
            user_validator = %config.components.user_validator,
            "Resolved router components"
        );
        Ok(Self::new(devices, validator, &config.worker)?)
    }

    /// Queue a command; the returned acknowledgement is always "Command accepted"
    pub fn handle_command(
        &self,
        device_id: &str,
        command: &str,
        user_id: &str,
        token: &str,
    ) -> String {
        self.enqueue(MessageTask::command(
            device_id,
            command,
            UserCredentials::new(user_id, token),
        ));
        acks::COMMAND_ACCEPTED.to_string()
    }

    pub fn handle_status_report(&self, device_id: &str, status: &str, user_id: &str, token: &str) {
        self.enqueue(MessageTask::status_report(
            device_id,
            status,
            UserCredentials::new(user_id, token),
        ));
    }

    /// Queue a heartbeat; returns true as soon as it is queued
    pub fn handle_heartbeat(&self, device_id: &str, user_id: &str, token: &str) -> bool {
        self.enqueue(MessageTask::heartbeat(
            device_id,
            UserCredentials::new(user_id, token),
        ));
        true
    }

    pub fn handle_disconnect(&self, device_id: &str) {
        self.enqueue(MessageTask::disconnect(device_id));
    }

    fn enqueue(&self, task: MessageTask) {
        let kind = task.kind;
        let device_id = task.device_id.clone();
        let processor = self.processor.clone();

        match self.sender.submit(move || processor.process(task)) {
            Ok(()) => {
                self.processor
                    .counters
                    .enqueued
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.processor.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log_error(
                    "message_router",
                    kind.as_str(),
                    &e.to_string(),
                    Some(&format!("device_id={device_id}; event dropped")),
                );
            }
        }
    }

    /// Registry the router mutates, for read-side queries
    pub fn device_registry(&self) -> Arc<dyn DeviceRegistry> {
        Arc::clone(&self.processor.devices)
    }

    /// Submit handle for the router's worker, for jobs that must run on the
    /// same thread as event processing
    pub fn sender(&self) -> TaskSender {
        self.sender.clone()
    }

    /// Block until every event queued so far has been processed
    pub fn sync(&self, timeout: Duration) -> std::result::Result<(), WorkerError> {
        self.sender.sync(timeout)
    }

    /// Stop the worker after it has drained queued events. Idempotent.
    pub fn shutdown(&self) -> std::result::Result<(), WorkerError> {
        if self.worker.is_running() {
            info!(stats = ?self.stats(), "Message router shutting down");
        }
        self.worker.stop()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn stats(&self) -> RouterStats {
        self.processor.counters.snapshot()
    }

    pub fn worker_stats(&self) -> WorkerStats {
        self.worker.stats()
    }
}

impl Drop for MessageRouter {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log_error("message_router", "shutdown", &e.to_string(), None);
        }
    }
}
