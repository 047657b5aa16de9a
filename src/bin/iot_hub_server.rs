//! IoT Hub Server Binary
//!
//! Loads configuration, wires the built-in components into a message router
//! and serves the device gateway until Ctrl-C.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use iot_hub::config::ConfigManager;
use iot_hub::device::LivenessSweeper;
use iot_hub::logging::init_structured_logging;
use iot_hub::message::MessageRouter;
use iot_hub::registry::Components;
use iot_hub::service::{DeviceGatewayServer, IotService};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("failed to load configuration")?;
    let config = manager.config();
    init_structured_logging(&config.logging);

    info!(environment = %manager.environment(), "Starting IoT hub server");

    let components =
        Components::with_builtins(config).context("failed to register built-in components")?;
    let router = Arc::new(
        MessageRouter::from_components(&components, config)
            .context("failed to start message router")?,
    );

    let sweeper = match config.liveness.sweep_interval() {
        Some(interval) => Some(
            LivenessSweeper::start(router.device_registry(), router.sender(), interval)
                .context("failed to start liveness sweeper")?,
        ),
        None => None,
    };

    let service = Arc::new(IotService::new(Arc::clone(&router)));
    let server = DeviceGatewayServer::new(config.server.clone(), service);
    let address = server.start().await.context("failed to start device gateway")?;
    info!(address = %address, "IoT hub server ready");

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    server.stop().await?;
    if let Some(sweeper) = sweeper {
        sweeper.stop();
    }
    if let Err(e) = router.sync(DRAIN_TIMEOUT) {
        tracing::warn!(error = %e, "Router did not drain before shutdown");
    }
    router.shutdown()?;

    info!(stats = ?router.stats(), "IoT hub server stopped");
    Ok(())
}
