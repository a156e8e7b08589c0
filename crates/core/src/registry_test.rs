//! Tests for the plugin registry

use crate::config::PluginConfig;
use crate::error::{ConfigError, RegistryError};
use crate::filter::{AllFilter, Filter};
use crate::format::Forward;
use crate::message::Message;
use crate::plugin::{Plugin, PluginInstance, Registrable};
use crate::registry::Registry;

/// Filter that rejects everything; stands in for a second registration
/// under a name that is already taken.
#[derive(Debug, Default)]
struct RejectFilter;

impl Plugin for RejectFilter {
    fn configure(&mut self, _conf: &mut PluginConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl Filter for RejectFilter {
    fn accepts(&self, _message: &Message) -> bool {
        false
    }
}

#[test]
fn create_returns_fresh_instances() {
    let mut registry = Registry::new();
    registry.register::<AllFilter>();
    registry.register::<Forward>();

    let instance = registry.create("filter.all").expect("known type");
    assert_eq!(instance.kind(), "filter");

    let instance = registry.create("format.forward").expect("known type");
    assert_eq!(instance.kind(), "formatter");
}

#[test]
fn unknown_type_fails() {
    let registry = Registry::new();
    let err = registry.create("consumer.bogus").expect_err("unknown");
    assert!(matches!(err, RegistryError::UnknownType(name) if name == "consumer.bogus"));
}

#[test]
fn last_registration_wins_silently() {
    let mut registry = Registry::new();
    registry.register::<AllFilter>();
    registry.register_ctor(AllFilter::TYPE_NAME, || {
        PluginInstance::Filter(Box::new(RejectFilter))
    });

    let instance = registry.create(AllFilter::TYPE_NAME).expect("known type");
    let PluginInstance::Filter(filter) = instance else {
        panic!("expected a filter");
    };
    let msg = Message::from_slice(b"x", crate::message::WILDCARD_STREAM, 0);
    assert!(!filter.accepts(&msg), "replacement constructor must be used");
}

#[test]
fn configure_dispatches_through_the_instance() {
    let mut registry = Registry::new();
    registry.register::<Forward>();

    let mut instance = registry.create("format.forward").expect("known type");
    let mut node = PluginConfig::new("format.forward");
    instance.configure(&mut node).expect("configure succeeds");
}

#[test]
fn type_names_are_sorted() {
    let mut registry = Registry::new();
    registry.register::<Forward>();
    registry.register::<AllFilter>();

    assert_eq!(registry.type_names(), vec!["filter.all", "format.forward"]);
    assert!(registry.contains("filter.all"));
    assert!(!registry.contains("filter.none"));
}
