//! Plugin registry
//!
//! Maps canonical type names to plugin constructors. The coordinator owns
//! one registry, populates it with every builtin before loading
//! configuration, and materializes fresh zero-valued instances from it by
//! type name. The registry is stateless after population.

use std::collections::HashMap;

use crate::error::RegistryError;
use crate::plugin::{PluginInstance, Registrable};

/// Constructor producing a fresh, unconfigured plugin instance.
pub type PluginCtor = fn() -> PluginInstance;

/// Registry of instantiable plugin types.
#[derive(Default)]
pub struct Registry {
    constructors: HashMap<String, PluginCtor>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin type under its canonical name.
    ///
    /// Duplicate registrations are accepted silently; the last one wins.
    /// Registration order is not significant otherwise.
    pub fn register<P: Registrable>(&mut self) {
        self.constructors
            .insert(P::TYPE_NAME.to_string(), P::instance);
    }

    /// Register a constructor under an explicit name. Useful for tests
    /// and embedders wrapping existing plugins.
    pub fn register_ctor(&mut self, type_name: impl Into<String>, ctor: PluginCtor) {
        self.constructors.insert(type_name.into(), ctor);
    }

    /// Materialize a fresh instance of the named type.
    pub fn create(&self, type_name: &str) -> Result<PluginInstance, RegistryError> {
        self.constructors
            .get(type_name)
            .map(|ctor| ctor())
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))
    }

    /// Whether a type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// All registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
