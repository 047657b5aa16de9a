//! # Device Service
//!
//! The client-facing surface: `send_command`, `report_status` and the
//! streaming `heartbeat` call.
//!
//! - [`protocol`]: request/response types and their line-delimited JSON form
//! - [`facade`]: [`IotService`], the synchronous mapping onto the router
//! - [`tcp_server`]: [`DeviceGatewayServer`], the tokio TCP transport

pub mod facade;
pub mod protocol;
pub mod tcp_server;

pub use facade::{HeartbeatSession, IotService};
pub use protocol::{Request, Response};
pub use tcp_server::{DeviceGatewayServer, GatewayStats, ServiceError};
