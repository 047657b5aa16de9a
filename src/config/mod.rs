//! # IoT Hub Configuration System
//!
//! Layered configuration: built-in defaults, an optional TOML file and
//! `IOT_`-prefixed environment overrides, merged by [`ConfigManager`] and
//! validated before anything is constructed from them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iot_hub::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let shards = manager.config().store.shard_count;
//! let timeout = manager.config().liveness.heartbeat_timeout();
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment overrides
//!
//! Nested keys are joined with a double underscore:
//!
//! ```text
//! IOT_STORE__SHARD_COUNT=32
//! IOT_COMPONENTS__USER_VALIDATOR=mock
//! IOT_WORKER__QUEUE_CAPACITY=10000
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    components, DEFAULT_BIND_ADDRESS, DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_SHARD_COUNT,
    DEFAULT_WORKER_NAME,
};
use crate::execution::{ChannelCapacity, OverflowPolicy};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/iot-hub.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IotConfig {
    /// Device state storage
    pub store: StoreConfig,

    /// Heartbeat timeout and optional background sweep
    pub liveness: LivenessConfig,

    /// Router worker thread and its task channel
    pub worker: WorkerConfig,

    /// Which registered components to use for each capability
    pub components: ComponentsConfig,

    /// TCP device service
    pub server: ServerConfig,

    /// Log level and output format
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub shard_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub heartbeat_timeout_secs: u64,
    /// Run a periodic sweep demoting stale devices. `None` keeps expiry lazy.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT.as_secs(),
            sweep_interval_secs: None,
        }
    }
}

impl LivenessConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Thread name, also used in logs
    pub name: String,
    /// Bound on queued tasks. `None` means unbounded.
    pub queue_capacity: Option<usize>,
    /// Applied when a bounded queue is full
    pub overflow_policy: OverflowPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKER_NAME.to_string(),
            queue_capacity: None,
            overflow_policy: OverflowPolicy::Block,
        }
    }
}

impl WorkerConfig {
    pub fn channel_capacity(&self) -> ChannelCapacity {
        match self.queue_capacity {
            Some(capacity) => ChannelCapacity::bounded(capacity, self.overflow_policy),
            None => ChannelCapacity::Unbounded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ComponentsConfig {
    pub device_registry: String,
    pub user_validator: String,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            device_registry: components::DEFAULT.to_string(),
            user_validator: components::DEFAULT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// How long `stop` waits for open connections to wind down
    pub graceful_shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            graceful_shutdown_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; when unset the level follows the environment
    pub level: Option<String>,
    pub format: LogFormat,
}

impl IotConfig {
    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.shard_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "store.shard_count",
                "0",
                "shard count must be greater than 0",
            ));
        }

        if self.liveness.heartbeat_timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "liveness.heartbeat_timeout_secs",
                "0",
                "heartbeat timeout must be greater than 0",
            ));
        }

        if self.liveness.sweep_interval_secs == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "liveness.sweep_interval_secs",
                "0",
                "sweep interval must be greater than 0 when set",
            ));
        }

        if self.worker.name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "worker.name",
                "worker configuration",
            ));
        }

        if self.worker.queue_capacity == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "worker.queue_capacity",
                "0",
                "queue capacity must be greater than 0 when set",
            ));
        }

        if self.components.device_registry.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "components.device_registry",
                "components configuration",
            ));
        }

        if self.components.user_validator.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "components.user_validator",
                "components configuration",
            ));
        }

        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "server.bind_address",
                "server configuration",
            ));
        }

        Ok(())
    }
}
