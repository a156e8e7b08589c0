//! Message formatters
//!
//! Formatters shape a message's payload right before it reaches a sink:
//! pass-through, envelope affixes, or a timestamp prefix. A formatter is
//! stateful per call site (`prepare_message` then `len`/`bytes`) and is
//! never shared across tasks; every producer owns its own instance.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::{unescape, PluginConfig};
use crate::error::ConfigError;
use crate::message::Message;
use crate::plugin::{Plugin, PluginInstance, Registrable};

/// Default timestamp layout for [`Timestamp`].
const DEFAULT_TIMESTAMP_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.3f ";

/// Shapes payloads at the producer edge.
pub trait Formatter: Plugin + Sync {
    /// Render the message into internal state.
    fn prepare_message(&mut self, message: &Message);

    /// Byte length of the prepared payload.
    fn len(&self) -> usize;

    /// Whether the prepared payload is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The prepared payload.
    fn bytes(&self) -> Bytes;
}

/// Emits the payload unchanged.
#[derive(Debug, Default)]
pub struct Forward {
    prepared: Bytes,
}

impl Plugin for Forward {
    fn configure(&mut self, _conf: &mut PluginConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl Formatter for Forward {
    fn prepare_message(&mut self, message: &Message) {
        self.prepared = message.payload().clone();
    }

    fn len(&self) -> usize {
        self.prepared.len()
    }

    fn bytes(&self) -> Bytes {
        self.prepared.clone()
    }
}

impl Registrable for Forward {
    const TYPE_NAME: &'static str = "format.forward";

    fn instance() -> PluginInstance {
        PluginInstance::Formatter(Box::new(Forward::default()))
    }
}

/// Wraps the payload in a configurable prefix and postfix.
///
/// Options: `Prefix` (default empty), `Postfix` (default `"\n"`), both
/// honoring `\n \r \t` escapes.
#[derive(Debug)]
pub struct Envelope {
    prefix: Vec<u8>,
    postfix: Vec<u8>,
    prepared: Bytes,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            prefix: Vec::new(),
            postfix: b"\n".to_vec(),
            prepared: Bytes::new(),
        }
    }
}

impl Plugin for Envelope {
    fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError> {
        self.prefix = unescape(&conf.get_string("Prefix", "")).into_bytes();
        self.postfix = unescape(&conf.get_string("Postfix", "\\n")).into_bytes();
        Ok(())
    }
}

impl Formatter for Envelope {
    fn prepare_message(&mut self, message: &Message) {
        let payload = message.payload();
        let mut buffer =
            BytesMut::with_capacity(self.prefix.len() + payload.len() + self.postfix.len());
        buffer.put_slice(&self.prefix);
        buffer.put_slice(payload);
        buffer.put_slice(&self.postfix);
        self.prepared = buffer.freeze();
    }

    fn len(&self) -> usize {
        self.prepared.len()
    }

    fn bytes(&self) -> Bytes {
        self.prepared.clone()
    }
}

impl Registrable for Envelope {
    const TYPE_NAME: &'static str = "format.envelope";

    fn instance() -> PluginInstance {
        PluginInstance::Formatter(Box::new(Envelope::default()))
    }
}

/// Prefixes the payload with the message's ingest time.
///
/// The `Timestamp` option is a chrono format string; trailing content is
/// the raw payload followed by `"\n"` unless `Postfix` overrides it.
#[derive(Debug)]
pub struct Timestamp {
    layout: String,
    postfix: Vec<u8>,
    prepared: Bytes,
}

impl Default for Timestamp {
    fn default() -> Self {
        Self {
            layout: DEFAULT_TIMESTAMP_LAYOUT.to_string(),
            postfix: b"\n".to_vec(),
            prepared: Bytes::new(),
        }
    }
}

impl Plugin for Timestamp {
    fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError> {
        let layout = conf.get_string("Timestamp", DEFAULT_TIMESTAMP_LAYOUT);
        // chrono panics on invalid specifiers at render time, so reject
        // them here instead.
        if chrono::format::StrftimeItems::new(&layout)
            .any(|item| matches!(item, chrono::format::Item::Error))
        {
            return Err(ConfigError::invalid_option(
                "format.timestamp",
                "Timestamp",
                "invalid time format string",
            ));
        }
        self.layout = layout;
        self.postfix = unescape(&conf.get_string("Postfix", "\\n")).into_bytes();
        Ok(())
    }
}

impl Formatter for Timestamp {
    fn prepare_message(&mut self, message: &Message) {
        let stamp = message.timestamp().format(&self.layout).to_string();
        let payload = message.payload();
        let mut buffer =
            BytesMut::with_capacity(stamp.len() + payload.len() + self.postfix.len());
        buffer.put_slice(stamp.as_bytes());
        buffer.put_slice(payload);
        buffer.put_slice(&self.postfix);
        self.prepared = buffer.freeze();
    }

    fn len(&self) -> usize {
        self.prepared.len()
    }

    fn bytes(&self) -> Bytes {
        self.prepared.clone()
    }
}

impl Registrable for Timestamp {
    const TYPE_NAME: &'static str = "format.timestamp";

    fn instance() -> PluginInstance {
        PluginInstance::Formatter(Box::new(Timestamp::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StreamId;

    fn msg(payload: &[u8]) -> Message {
        Message::from_slice(payload, StreamId::from_name("s"), 0)
    }

    #[test]
    fn forward_passes_payload_through() {
        let mut format = Forward::default();
        format.prepare_message(&msg(b"abc"));
        assert_eq!(format.len(), 3);
        assert_eq!(format.bytes().as_ref(), b"abc");
    }

    #[test]
    fn envelope_defaults_add_a_newline() {
        let mut format = Envelope::default();
        format.prepare_message(&msg(b"abc"));
        assert_eq!(format.bytes().as_ref(), b"abc\n");
    }

    #[test]
    fn envelope_honors_configured_affixes() {
        let mut node = PluginConfig::new("format.envelope");
        node.override_value("Prefix", "[");
        node.override_value("Postfix", "]\\n");

        let mut format = Envelope::default();
        format.configure(&mut node).expect("configure");
        format.prepare_message(&msg(b"abc"));
        assert_eq!(format.bytes().as_ref(), b"[abc]\n");
        assert_eq!(format.len(), 6);
    }

    #[test]
    fn invalid_timestamp_layout_is_rejected() {
        let mut node = PluginConfig::new("format.timestamp");
        node.override_value("Timestamp", "stray percent %");
        let mut format = Timestamp::default();
        assert!(format.configure(&mut node).is_err());
    }

    #[test]
    fn timestamp_prefixes_ingest_time() {
        let mut node = PluginConfig::new("format.timestamp");
        node.override_value("Timestamp", "%Y ");

        let mut format = Timestamp::default();
        format.configure(&mut node).expect("configure");
        let message = msg(b"abc");
        format.prepare_message(&message);

        let expected_prefix = message.timestamp().format("%Y ").to_string();
        let rendered = format.bytes();
        assert!(rendered.starts_with(expected_prefix.as_bytes()));
        assert!(rendered.ends_with(b"abc\n"));
    }
}
