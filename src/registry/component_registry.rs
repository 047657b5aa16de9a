//! # Component Registry
//!
//! Name-keyed factory table for one capability (a trait object type). Lets the
//! device registry or user validator implementation be chosen by name at
//! runtime instead of at compile time.
//!
//! ## Usage
//!
//! ```rust
//! use iot_hub::registry::ComponentRegistry;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let registry: ComponentRegistry<dyn Greeter> = ComponentRegistry::new("greeter");
//! registry
//!     .register_creator("english", || Arc::new(English) as Arc<dyn Greeter>)
//!     .unwrap();
//!
//! assert_eq!(registry.create("english").unwrap().greet(), "hello");
//! assert!(registry.create("klingon").is_none());
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Factory producing a fresh capability instance
pub type Factory<C> = Arc<dyn Fn() -> Arc<C> + Send + Sync>;

/// Errors raised while registering or resolving components
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid {capability} component name: '{name}'")]
    InvalidName { capability: String, name: String },

    #[error("No {capability} component registered under '{name}' (known: {known:?})")]
    UnknownComponent {
        capability: String,
        name: String,
        known: Vec<String>,
    },
}

/// Thread-safe registry of factories for capability `C`
pub struct ComponentRegistry<C: ?Sized> {
    capability: String,
    creators: RwLock<HashMap<String, Factory<C>>>,
}

impl<C: ?Sized> ComponentRegistry<C> {
    /// Create an empty registry; `capability` names it in logs and errors
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            creators: RwLock::new(HashMap::new()),
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Store `factory` under `name`, replacing any previous registration
    pub fn register_creator<F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidName {
                capability: self.capability.clone(),
                name: name.to_string(),
            });
        }

        let previous = self
            .creators
            .write()
            .insert(name.to_string(), Arc::new(factory));

        if previous.is_some() {
            warn!(
                capability = %self.capability,
                name = %name,
                "Replacing existing component registration"
            );
        } else {
            info!(capability = %self.capability, name = %name, "Registered component");
        }
        Ok(())
    }

    /// Build a new instance of the component registered under `name`
    pub fn create(&self, name: &str) -> Option<Arc<C>> {
        // Clone the factory out so it runs without the lock held
        let factory = self.creators.read().get(name).cloned();
        match factory {
            Some(factory) => Some(factory()),
            None => {
                debug!(capability = %self.capability, name = %name, "Unknown component requested");
                None
            }
        }
    }

    /// Like [`create`](Self::create) but with an error naming what is known
    pub fn resolve(&self, name: &str) -> Result<Arc<C>, RegistryError> {
        self.create(name)
            .ok_or_else(|| RegistryError::UnknownComponent {
                capability: self.capability.clone(),
                name: name.to_string(),
                known: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.creators.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.creators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.read().is_empty()
    }
}

impl<C: ?Sized> fmt::Debug for ComponentRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("capability", &self.capability)
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct Alpha;
    impl Named for Alpha {
        fn name(&self) -> &'static str {
            "alpha"
        }
    }

    struct Beta;
    impl Named for Beta {
        fn name(&self) -> &'static str {
            "beta"
        }
    }

    fn registry() -> ComponentRegistry<dyn Named> {
        ComponentRegistry::new("named")
    }

    #[test]
    fn test_create_known_and_unknown() {
        let registry = registry();
        registry
            .register_creator("alpha", || Arc::new(Alpha) as Arc<dyn Named>)
            .unwrap();

        assert_eq!(registry.create("alpha").unwrap().name(), "alpha");
        assert!(registry.create("unknown-name").is_none());
        assert!(registry.contains("alpha"));
        assert!(!registry.contains("unknown-name"));
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = registry();
        registry
            .register_creator("x", || Arc::new(Alpha) as Arc<dyn Named>)
            .unwrap();
        registry
            .register_creator("x", || Arc::new(Beta) as Arc<dyn Named>)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.create("x").unwrap().name(), "beta");
    }

    #[test]
    fn test_blank_name_rejected() {
        let registry = registry();
        let result = registry.register_creator("   ", || Arc::new(Alpha) as Arc<dyn Named>);
        assert!(matches!(result, Err(RegistryError::InvalidName { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_each_create_calls_factory() {
        let registry = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry
            .register_creator("alpha", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(Alpha) as Arc<dyn Named>
            })
            .unwrap();

        registry.create("alpha");
        registry.create("alpha");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolve_lists_known_names() {
        let registry = registry();
        registry
            .register_creator("beta", || Arc::new(Beta) as Arc<dyn Named>)
            .unwrap();
        registry
            .register_creator("alpha", || Arc::new(Alpha) as Arc<dyn Named>)
            .unwrap();

        assert_eq!(registry.names(), vec!["alpha", "beta"]);
        match registry.resolve("gamma") {
            Err(RegistryError::UnknownComponent { name, known, .. }) => {
                assert_eq!(name, "gamma");
                assert_eq!(known, vec!["alpha", "beta"]);
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.name())),
        }
    }
}
