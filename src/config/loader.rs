//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with the
//! `config` crate, lowest precedence first:
//!
//! 1. serde defaults on [`IotConfig`]
//! 2. a TOML file (`IOT_CONFIG_PATH`, else `config/iot-hub.toml` if present)
//! 3. `IOT_`-prefixed environment variables (`__` separates nested keys)

use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::IotConfig;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "IOT_CONFIG_PATH";

/// File picked up when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/iot-hub.toml";

const ENV_PREFIX: &str = "IOT";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: IotConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let explicit = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from_path(explicit)
    }

    /// Load from a specific file (required to exist) or the default location
    /// (optional), with environment overrides applied on top
    pub fn load_from_path(path: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(path, true)
    }

    /// Load from a file only, ignoring `IOT_` environment variables.
    /// Useful in tests that must not depend on the process environment.
    pub fn load_file_only(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(Some(path.as_ref().to_path_buf()), false)
    }

    /// Wrap an already-built configuration (validated first)
    pub fn from_config(config: IotConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_path: None,
        }))
    }

    fn build(explicit_path: Option<PathBuf>, include_env: bool) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let mut builder = Config::builder();

        let config_path = match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigurationError::ConfigFileNotFound { path });
                }
                builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
                Some(path)
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    builder = builder
                        .add_source(File::from(default_path.as_path()).format(FileFormat::Toml));
                    Some(default_path)
                } else {
                    None
                }
            }
        };

        if include_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: IotConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );
        let config_file = config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<defaults>".to_string());
        info!(
            environment = %environment,
            config_file = %config_file,
            shard_count = config.store.shard_count,
            device_registry = %config.components.device_registry,
            user_validator = %config.components.user_validator,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_path,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &IotConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("IOT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::OverflowPolicy;
    use std::io::Write;

    #[test]
    fn test_load_file_only_reads_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[store]
shard_count = 8

[liveness]
heartbeat_timeout_secs = 10
sweep_interval_secs = 5

[worker]
queue_capacity = 256
overflow_policy = "drop_oldest"

[components]
user_validator = "mock"
"#
        )
        .unwrap();

        let manager = ConfigManager::load_file_only(file.path()).unwrap();
        let config = manager.config();

        assert_eq!(config.store.shard_count, 8);
        assert_eq!(config.liveness.heartbeat_timeout_secs, 10);
        assert_eq!(config.liveness.sweep_interval_secs, Some(5));
        assert_eq!(config.worker.queue_capacity, Some(256));
        assert_eq!(config.worker.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.components.user_validator, "mock");
        assert_eq!(config.components.device_registry, "default");
        assert_eq!(manager.config_path(), Some(file.path()));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = ConfigManager::load_file_only("/definitely/not/here/iot-hub.toml");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[store]\nshard_count = 0").unwrap();

        let result = ConfigManager::load_file_only(file.path());
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = IotConfig::default();
        assert!(ConfigManager::from_config(config.clone()).is_ok());

        config.liveness.heartbeat_timeout_secs = 0;
        assert!(ConfigManager::from_config(config).is_err());
    }
}
