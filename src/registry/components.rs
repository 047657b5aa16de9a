//! Per-capability component registries and the explicit startup step that
//! fills them.

use std::sync::Arc;
use tracing::info;

use super::component_registry::{ComponentRegistry, RegistryError};
use crate::config::IotConfig;
use crate::constants::components as names;
use crate::device::{DefaultDeviceRegistry, DeviceRegistry};
use crate::logging::log_registry_operation;
use crate::user::{DefaultUserValidator, MockUserValidator, UserValidator};

pub const DEVICE_REGISTRY_CAPABILITY: &str = "device_registry";
pub const USER_VALIDATOR_CAPABILITY: &str = "user_validator";

/// One registry per pluggable capability, created once at startup and passed
/// to whatever needs to resolve components
#[derive(Debug)]
pub struct Components {
    pub device_registries: ComponentRegistry<dyn DeviceRegistry>,
    pub user_validators: ComponentRegistry<dyn UserValidator>,
}

impl Components {
    /// Empty registries; nothing resolves until something is registered
    pub fn new() -> Self {
        Self {
            device_registries: ComponentRegistry::new(DEVICE_REGISTRY_CAPABILITY),
            user_validators: ComponentRegistry::new(USER_VALIDATOR_CAPABILITY),
        }
    }

    /// Registries pre-populated with the built-in components
    pub fn with_builtins(config: &IotConfig) -> Result<Self, RegistryError> {
        let components = Self::new();
        register_builtin_components(&components, config)?;
        Ok(components)
    }

    pub fn resolve_device_registry(&self, name: &str) -> Result<Arc<dyn DeviceRegistry>, RegistryError> {
        self.device_registries.resolve(name)
    }

    pub fn resolve_user_validator(&self, name: &str) -> Result<Arc<dyn UserValidator>, RegistryError> {
        self.user_validators.resolve(name)
    }
}

impl Default for Components {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the components shipped with the crate:
///
/// - device registry `"default"`: [`DefaultDeviceRegistry`] sized from `config`
/// - user validator `"default"`: [`DefaultUserValidator`]
/// - user validator `"mock"`: [`MockUserValidator`]
pub fn register_builtin_components(
    components: &Components,
    config: &IotConfig,
) -> Result<(), RegistryError> {
    let shard_count = config.store.shard_count;
    let timeout = config.liveness.heartbeat_timeout();

    components
        .device_registries
        .register_creator(names::DEFAULT, move || {
            Arc::new(DefaultDeviceRegistry::with_settings(shard_count, timeout))
                as Arc<dyn DeviceRegistry>
        })?;

    components
        .user_validators
        .register_creator(names::DEFAULT, || {
            Arc::new(DefaultUserValidator) as Arc<dyn UserValidator>
        })?;
    components
        .user_validators
        .register_creator(names::MOCK, || {
            Arc::new(MockUserValidator) as Arc<dyn UserValidator>
        })?;

    log_registry_operation(
        "register_builtins",
        "all",
        None,
        "completed",
        Some(&format!(
            "device_registries={:?} user_validators={:?}",
            components.device_registries.names(),
            components.user_validators.names()
        )),
    );
    info!(
        auth_mock = cfg!(feature = "auth-mock"),
        "Built-in components registered"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::UserCredentials;

    #[test]
    fn test_builtins_resolve() {
        let components = Components::with_builtins(&IotConfig::default()).unwrap();

        assert_eq!(components.device_registries.names(), vec!["default"]);
        assert_eq!(components.user_validators.names(), vec!["default", "mock"]);

        let validator = components.resolve_user_validator("mock").unwrap();
        assert!(validator.validate_user(&UserCredentials::new("u", "t")));

        let devices = components.resolve_device_registry("default").unwrap();
        assert!(devices.register("d1"));
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let components = Components::with_builtins(&IotConfig::default()).unwrap();
        assert!(matches!(
            components.resolve_device_registry("redis"),
            Err(RegistryError::UnknownComponent { .. })
        ));
        assert!(components.device_registries.create("redis").is_none());
    }

    #[test]
    fn test_each_resolve_builds_a_fresh_registry() {
        let components = Components::with_builtins(&IotConfig::default()).unwrap();
        let first = components.resolve_device_registry("default").unwrap();
        let second = components.resolve_device_registry("default").unwrap();

        first.register("d1");
        assert_eq!(first.device_count(), 1);
        assert_eq!(second.device_count(), 0);
    }

    #[test]
    fn test_custom_component_can_replace_builtin() {
        let components = Components::with_builtins(&IotConfig::default()).unwrap();
        components
            .user_validators
            .register_creator("default", || Arc::new(MockUserValidator) as Arc<dyn UserValidator>)
            .unwrap();

        let validator = components.resolve_user_validator("default").unwrap();
        assert!(validator.validate_user(&UserCredentials::default()));
    }
}
