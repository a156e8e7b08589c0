//! Spool - Pipeline core
//!
//! The types every other Spool crate builds on: messages and stream
//! identity, the plugin registry and configuration nodes, the buffered
//! delimited reader, control signalling with worker accounting, the
//! consumer/producer bases with their control loops, and the
//! double-buffered batcher producers use for bulk delivery.
//!
//! # Architecture
//!
//! ```text
//! [Consumers]                [Router]                  [Producers]
//!   file ──┐                                        ┌──→ console
//!   stdin ─┴─→ Message ──→ stream fan-out ──────────┼──→ file (batched)
//!               + filters, keyed by StreamId        └──→ null
//! ```
//!
//! Consumers emit [`message::Message`] values through their
//! [`consumer::ConsumerBase`]; the pipeline crate fans them out by stream
//! id; producers receive them through a [`producer::ProducerBase`] control
//! loop and either write directly or aggregate through
//! [`batcher::MessageBatch`].

pub mod batcher;
pub mod config;
pub mod consumer;
pub mod control;
pub mod error;
pub mod filter;
pub mod format;
pub mod message;
pub mod plugin;
pub mod producer;
pub mod reader;
pub mod registry;

pub use batcher::{BatchedMessage, MessageBatch, BATCH_GROW_SIZE};
pub use config::{unescape, PluginConfig};
pub use consumer::{ConsumerBase, ConsumerControl, MessageEmitter};
pub use control::{control_channel, ControlSignal, Worker, WorkerGroup};
pub use error::{ConfigError, ProducerError, ReaderError, RegistryError};
pub use filter::{AllFilter, Filter};
pub use format::{Envelope, Formatter, Forward, Timestamp};
pub use message::{
    Message, StreamId, DROPPED_STREAM, INTERNAL_LOG_STREAM, WILDCARD_STREAM,
    WILDCARD_STREAM_NAME,
};
pub use plugin::{Consumer, Plugin, PluginInstance, Producer, Registrable};
pub use producer::{MessageHandler, ProducerBase, STOP_DRAIN_LIMIT};
pub use reader::{BufferedReader, BUFFER_GROW_SIZE};
pub use registry::Registry;
