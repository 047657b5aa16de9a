//! # Structured Logging Module
//!
//! Environment-aware structured logging for the hub. The subscriber is
//! installed at most once per process; later calls are no-ops, and an already
//! installed global subscriber (for instance one set up by a test harness) is
//! left in place.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging from the `[logging]` configuration section
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let directive = resolve_filter_directive(config, &environment);

        let result = match config.format {
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_names(true)
                        .with_level(true)
                        .with_ansi(true)
                        .with_filter(EnvFilter::new(&directive)),
                )
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_names(true)
                        .with_level(true)
                        .with_filter(EnvFilter::new(&directive)),
                )
                .try_init(),
        };

        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            filter = %directive,
            format = ?config.format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// `RUST_LOG` wins, then the configured level, then the environment default
fn resolve_filter_directive(config: &LoggingConfig, environment: &str) -> String {
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| config.level.clone())
        .unwrap_or_else(|| get_log_level(environment).to_string())
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("IOT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for device state changes
pub fn log_device_operation(operation: &str, device_id: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        device_id = %device_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📟 DEVICE_OPERATION"
    );
}

/// Log structured data for routed tasks
pub fn log_task_operation(
    operation: &str,
    kind: &str,
    device_id: &str,
    user_id: Option<&str>,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        kind = %kind,
        device_id = %device_id,
        user_id = user_id,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log structured data for component registry operations
pub fn log_registry_operation(
    operation: &str,
    capability: &str,
    name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        capability = %capability,
        name = name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📚 REGISTRY_OPERATION"
    );
}

/// Log structured error information
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
