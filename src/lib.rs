#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # IoT Hub Core
//!
//! Device liveness tracking and serialized event routing for an IoT hub.
//!
//! ## Overview
//!
//! Inbound device and user events (commands, status reports, heartbeats and
//! disconnects) may arrive on any number of threads. The router acknowledges
//! each one immediately and hands it to a single dedicated worker thread, which
//! validates the caller and then updates the device registry. Device state
//! lives in a sharded concurrent map, so read-side queries from other threads
//! never wait on unrelated devices.
//!
//! ```text
//! clients ─▶ DeviceGatewayServer ─▶ IotService ─▶ MessageRouter
//!                                                     │ submit
//!                                                     ▼
//!                                    TaskChannel ─▶ Worker thread
//!                                                     │ validate, then
//!                                                     ▼
//!                                    DeviceRegistry ─▶ ShardedStore
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Sharded concurrent key/value map
//! - [`execution`] - Task channel and single-threaded worker
//! - [`registry`] - Name-keyed component factories
//! - [`device`] - Device records, liveness rules and the optional sweeper
//! - [`user`] - Pluggable credential validation
//! - [`message`] - Event routing onto the worker
//! - [`service`] - Request/response protocol and the TCP gateway
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`logging`] - Structured logging setup and helpers
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust
//! use iot_hub::config::IotConfig;
//! use iot_hub::message::MessageRouter;
//! use iot_hub::registry::Components;
//! use std::time::Duration;
//!
//! # fn main() -> iot_hub::Result<()> {
//! let mut config = IotConfig::default();
//! config.components.user_validator = "mock".to_string();
//!
//! let components = Components::with_builtins(&config)?;
//! let router = MessageRouter::from_components(&components, &config)?;
//!
//! assert_eq!(router.handle_command("sensor-1", "reboot", "alice", "token"), "Command accepted");
//! router.sync(Duration::from_secs(5))?;
//! assert!(router.device_registry().is_online("sensor-1"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod execution;
pub mod logging;
pub mod message;
pub mod registry;
pub mod service;
pub mod store;
pub mod user;

pub use config::{ConfigManager, IotConfig};
pub use constants::DeviceStatus;
pub use device::{DefaultDeviceRegistry, DeviceRecord, DeviceRegistry};
pub use error::{IotError, Result};
pub use execution::{TaskSender, Worker};
pub use message::{MessageRouter, RouterStats};
pub use registry::{ComponentRegistry, Components, RegistryError};
pub use service::{DeviceGatewayServer, IotService};
pub use store::ShardedStore;
pub use user::{UserCredentials, UserValidator};
