//! Plugin instantiation and pipeline wiring
//!
//! Turns configuration nodes into running-ready plugin instances: the
//! registry materializes each node's type, `configure` binds it, and the
//! router is compiled from the stream bindings. A plugin that fails to
//! configure is logged and skipped; the rest of the pipeline still comes
//! up.

use spool_core::config::PluginConfig;
use spool_core::error::ConfigError;
use spool_core::filter::AllFilter;
use spool_core::format::{Envelope, Formatter, Forward, Timestamp};
use spool_core::message::{Message, StreamId};
use spool_core::plugin::{Consumer, PluginInstance, Producer, Registrable};
use spool_core::registry::Registry;
use spool_pipeline::{ProducerHandle, Router, DEFAULT_CHANNEL_SIZE};
use tokio::sync::mpsc;

use spool_consumers::{ConsoleConsumer, FileConsumer};
use spool_producers::{ConsoleProducer, FileProducer, NullProducer};

/// A configured consumer awaiting spawn.
pub struct ConsumerSpec {
    pub name: String,
    pub plugin: Box<dyn Consumer>,
    pub streams: Vec<StreamId>,
}

/// A configured producer awaiting spawn, with its message channel and
/// formatter already bound.
pub struct ProducerSpec {
    pub name: String,
    pub plugin: Box<dyn Producer>,
    pub formatter: Box<dyn Formatter>,
    pub receiver: mpsc::Receiver<Message>,
}

/// Everything the coordinator needs to run a pipeline.
pub struct PipelineBuild {
    pub router: Router,
    pub consumers: Vec<ConsumerSpec>,
    pub producers: Vec<ProducerSpec>,
}

/// Registry with every builtin plugin type.
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register::<FileConsumer>();
    registry.register::<ConsoleConsumer>();
    registry.register::<ConsoleProducer>();
    registry.register::<FileProducer>();
    registry.register::<NullProducer>();
    registry.register::<AllFilter>();
    registry.register::<Forward>();
    registry.register::<Envelope>();
    registry.register::<Timestamp>();
    registry
}

/// Instantiate and wire every enabled plugin node.
pub fn build(registry: &Registry, nodes: Vec<PluginConfig>) -> PipelineBuild {
    let mut router = Router::new();
    let mut consumers = Vec::new();
    let mut producers = Vec::new();

    for (index, mut node) in nodes.into_iter().enumerate() {
        let name = format!("{}#{index}", node.type_name());
        if !node.enabled() {
            tracing::info!(plugin = %name, "plugin disabled, skipping");
            continue;
        }

        let instance = match registry.create(node.type_name()) {
            Ok(instance) => instance,
            Err(err) => {
                tracing::error!(plugin = %name, %err, "cannot instantiate plugin");
                continue;
            }
        };

        match instance {
            PluginInstance::Consumer(mut plugin) => {
                if let Err(err) = plugin.configure(&mut node) {
                    tracing::error!(plugin = %name, %err, "plugin configuration failed");
                    continue;
                }
                consumers.push(ConsumerSpec {
                    name,
                    plugin,
                    streams: node.stream_ids(),
                });
            }

            PluginInstance::Producer(mut plugin) => {
                let formatter = match build_formatter(registry, &mut node) {
                    Ok(formatter) => formatter,
                    Err(err) => {
                        tracing::error!(plugin = %name, %err, "formatter configuration failed");
                        continue;
                    }
                };
                if let Err(err) = plugin.configure(&mut node) {
                    tracing::error!(plugin = %name, %err, "plugin configuration failed");
                    continue;
                }

                let (sender, receiver) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
                let handle = ProducerHandle::new(name.clone(), sender);
                for stream in node.stream_names() {
                    router.bind_producer(&stream, handle.clone());
                }
                producers.push(ProducerSpec {
                    name,
                    plugin,
                    formatter,
                    receiver,
                });
            }

            PluginInstance::Filter(_) => {
                // One filter instance per attached stream; instances are
                // not shared across streams.
                for stream in node.stream_names() {
                    match registry.create(node.type_name()) {
                        Ok(PluginInstance::Filter(mut filter)) => {
                            if let Err(err) = filter.configure(&mut node) {
                                tracing::error!(
                                    plugin = %name,
                                    %err,
                                    "filter configuration failed"
                                );
                                continue;
                            }
                            router.add_filter(&stream, filter);
                        }
                        _ => break,
                    }
                }
            }

            PluginInstance::Formatter(_) => {
                tracing::warn!(
                    plugin = %name,
                    "formatters attach through a producer's Format option, ignoring"
                );
            }
        }
    }

    PipelineBuild {
        router,
        consumers,
        producers,
    }
}

/// Materialize the formatter selected by a producer node's `Format`
/// option and configure it from the same node.
fn build_formatter(
    registry: &Registry,
    node: &mut PluginConfig,
) -> Result<Box<dyn Formatter>, ConfigError> {
    let format_name = node.get_string("Format", Forward::TYPE_NAME);
    match registry.create(&format_name) {
        Ok(PluginInstance::Formatter(mut formatter)) => {
            formatter.configure(node)?;
            Ok(formatter)
        }
        Ok(other) => Err(ConfigError::invalid_option(
            node.type_name().to_string(),
            "Format",
            format!("'{format_name}' is a {}, not a formatter", other.kind()),
        )),
        Err(err) => Err(ConfigError::invalid_option(
            node.type_name().to_string(),
            "Format",
            err.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_document;

    #[test]
    fn builtin_registry_knows_every_type() {
        let registry = builtin_registry();
        for type_name in [
            "consumer.file",
            "consumer.console",
            "producer.console",
            "producer.file",
            "producer.null",
            "filter.all",
            "format.forward",
            "format.envelope",
            "format.timestamp",
        ] {
            assert!(registry.contains(type_name), "missing {type_name}");
        }
    }

    #[test]
    fn build_wires_producers_into_the_router() {
        let registry = builtin_registry();
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "producer.null"
            Stream = ["accesslog", "errorlog"]
            "#,
        )
        .expect("valid document");

        let build = build(&registry, nodes);
        assert_eq!(build.producers.len(), 1);
        assert_eq!(build.router.producer_count("accesslog"), 1);
        assert_eq!(build.router.producer_count("errorlog"), 1);
        assert_eq!(build.router.producer_count("other"), 0);
    }

    #[test]
    fn failing_plugins_do_not_stop_the_build() {
        let registry = builtin_registry();
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "consumer.file"
            # File option missing: configuration error

            [[plugin]]
            Type = "producer.wat"
            # unknown type

            [[plugin]]
            Type = "producer.null"
            "#,
        )
        .expect("valid document");

        let build = build(&registry, nodes);
        assert!(build.consumers.is_empty());
        assert_eq!(build.producers.len(), 1);
    }

    #[test]
    fn disabled_plugins_are_skipped() {
        let registry = builtin_registry();
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "producer.null"
            Enable = false
            "#,
        )
        .expect("valid document");

        let build = build(&registry, nodes);
        assert!(build.producers.is_empty());
    }

    #[test]
    fn producer_formatter_comes_from_the_format_option() {
        let registry = builtin_registry();
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "producer.null"
            Format = "format.envelope"
            Postfix = "!"
            "#,
        )
        .expect("valid document");

        let mut build = build(&registry, nodes);
        let spec = build.producers.pop().expect("producer built");

        let mut formatter = spec.formatter;
        let message = Message::from_slice(b"x", StreamId::from_name("s"), 0);
        formatter.prepare_message(&message);
        assert_eq!(formatter.bytes().as_ref(), b"x!");
    }

    #[test]
    fn bogus_format_option_fails_the_producer() {
        let registry = builtin_registry();
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "producer.null"
            Format = "filter.all"
            "#,
        )
        .expect("valid document");

        let build = build(&registry, nodes);
        assert!(build.producers.is_empty());
    }

    #[test]
    fn filters_attach_to_their_streams() {
        let registry = builtin_registry();
        let nodes = parse_document(
            r#"
            [[plugin]]
            Type = "producer.null"
            Stream = "accesslog"

            [[plugin]]
            Type = "filter.all"
            Stream = "accesslog"
            "#,
        )
        .expect("valid document");

        let build = build(&registry, nodes);
        let message = Message::from_slice(b"x", StreamId::from_name("accesslog"), 0);
        assert_eq!(build.router.dispatch(&message), 1);
    }
}
