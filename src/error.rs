use thiserror::Error;

use crate::config::ConfigurationError;
use crate::execution::WorkerError;
use crate::registry::RegistryError;
use crate::service::ServiceError;

/// Top-level error for hub construction and lifecycle operations.
///
/// Routed events never surface errors to their caller; these only come from
/// setup (configuration, component resolution, worker start) and shutdown.
#[derive(Debug, Error)]
pub enum IotError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IotError>;
