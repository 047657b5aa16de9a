use iot_hub::config::{ConfigManager, ConfigurationError, LogFormat};
use iot_hub::execution::{ChannelCapacity, OverflowPolicy};
use std::io::Write;
use std::time::Duration;

fn write_config(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn test_full_document_round_trips_into_typed_config() -> anyhow::Result<()> {
    let file = write_config(
        r#"
[store]
shard_count = 32

[liveness]
heartbeat_timeout_secs = 45

[worker]
name = "edge-worker"
queue_capacity = 1000
overflow_policy = "reject"

[components]
device_registry = "default"
user_validator = "mock"

[server]
bind_address = "127.0.0.1:6000"
graceful_shutdown_timeout_ms = 250

[logging]
level = "info,iot_hub=debug"
format = "json"
"#,
    )?;

    let manager = ConfigManager::load_file_only(file.path())?;
    let config = manager.config();

    assert_eq!(config.store.shard_count, 32);
    assert_eq!(config.liveness.heartbeat_timeout(), Duration::from_secs(45));
    assert_eq!(
        config.worker.channel_capacity(),
        ChannelCapacity::Bounded {
            capacity: 1000,
            policy: OverflowPolicy::Reject
        }
    );
    assert_eq!(config.server.bind_address, "127.0.0.1:6000");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level.as_deref(), Some("info,iot_hub=debug"));
    Ok(())
}

#[test]
fn test_environment_overrides_file_values() -> anyhow::Result<()> {
    let file = write_config("[store]\nshard_count = 4\n\n[components]\nuser_validator = \"default\"\n")?;

    std::env::set_var("IOT_STORE__SHARD_COUNT", "64");
    std::env::set_var("IOT_COMPONENTS__USER_VALIDATOR", "mock");
    let result = ConfigManager::load_from_path(Some(file.path().to_path_buf()));
    std::env::remove_var("IOT_STORE__SHARD_COUNT");
    std::env::remove_var("IOT_COMPONENTS__USER_VALIDATOR");

    let manager = result?;
    assert_eq!(manager.config().store.shard_count, 64);
    assert_eq!(manager.config().components.user_validator, "mock");
    Ok(())
}

#[test]
fn test_unparseable_file_fails_to_load() -> anyhow::Result<()> {
    let file = write_config("[store\nshard_count = ")?;
    let result = ConfigManager::load_file_only(file.path());
    assert!(matches!(result, Err(ConfigurationError::LoadFailed { .. })));
    Ok(())
}

#[test]
fn test_wrong_type_fails_to_load() -> anyhow::Result<()> {
    let file = write_config("[store]\nshard_count = \"many\"\n")?;
    assert!(ConfigManager::load_file_only(file.path()).is_err());
    Ok(())
}
