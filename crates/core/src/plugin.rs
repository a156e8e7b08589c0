//! Plugin contracts
//!
//! Consumers produce messages into the pipeline, producers ship them to
//! external sinks, filters gate stream routing and formatters shape
//! payloads at the producer edge. All four are configured from a
//! `PluginConfig` node and instantiated through the registry.

use async_trait::async_trait;

use crate::config::PluginConfig;
use crate::consumer::ConsumerBase;
use crate::error::ConfigError;
use crate::filter::Filter;
use crate::format::Formatter;
use crate::producer::ProducerBase;

/// Common plugin surface: bind an instance to its configuration node.
pub trait Plugin: Send {
    /// Initialize this plugin with values from its configuration node.
    fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError>;
}

/// A source plugin. Runs until stopped, emitting messages through the
/// base handed to it.
#[async_trait]
pub trait Consumer: Plugin {
    /// Run the consumer. The worker token inside `base` is released when
    /// the consumer's work actually finishes, on every exit path.
    async fn consume(self: Box<Self>, base: ConsumerBase);
}

/// A sink plugin. Runs a message control loop until stopped.
#[async_trait]
pub trait Producer: Plugin {
    /// Run the producer until its control loop observes a stop.
    async fn produce(self: Box<Self>, base: ProducerBase);
}

/// A typed, not-yet-configured plugin instance as produced by the
/// registry.
pub enum PluginInstance {
    Consumer(Box<dyn Consumer>),
    Producer(Box<dyn Producer>),
    Filter(Box<dyn Filter>),
    Formatter(Box<dyn Formatter>),
}

impl PluginInstance {
    /// Bind the instance to its configuration node.
    pub fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError> {
        match self {
            PluginInstance::Consumer(plugin) => plugin.configure(conf),
            PluginInstance::Producer(plugin) => plugin.configure(conf),
            PluginInstance::Filter(plugin) => plugin.configure(conf),
            PluginInstance::Formatter(plugin) => plugin.configure(conf),
        }
    }

    /// The plugin category, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PluginInstance::Consumer(_) => "consumer",
            PluginInstance::Producer(_) => "producer",
            PluginInstance::Filter(_) => "filter",
            PluginInstance::Formatter(_) => "formatter",
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PluginInstance").field(&self.kind()).finish()
    }
}

/// Implemented by plugin types that can be listed in the registry.
///
/// The canonical type name is part of the plugin itself, so registration
/// sites cannot disagree about it.
pub trait Registrable {
    /// Canonical dotted type name, e.g. `consumer.file`.
    const TYPE_NAME: &'static str;

    /// Produce a fresh zero-valued instance.
    fn instance() -> PluginInstance;
}
