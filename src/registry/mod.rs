//! # Component Registries
//!
//! Runtime selection of pluggable capabilities by name.
//!
//! ```text
//! Components
//! ├── device_registries  ComponentRegistry<dyn DeviceRegistry>  ("default")
//! └── user_validators    ComponentRegistry<dyn UserValidator>   ("default", "mock")
//! ```
//!
//! There is no process-wide registry: a [`Components`] value is built during
//! startup ([`Components::with_builtins`]), optionally extended with custom
//! factories, and handed to the router, which resolves the names configured
//! under `[components]`.

pub mod component_registry;
pub mod components;

pub use component_registry::{ComponentRegistry, Factory, RegistryError};
pub use components::{
    register_builtin_components, Components, DEVICE_REGISTRY_CAPABILITY,
    USER_VALIDATOR_CAPABILITY,
};
