//! Null producer - discards all messages
//!
//! Receives messages, updates metrics and drops the data. Used to
//! benchmark the pipeline without sink overhead and as the observation
//! point in end-to-end tests.

use std::sync::Arc;

use async_trait::async_trait;

use spool_core::config::PluginConfig;
use spool_core::error::ConfigError;
use spool_core::message::Message;
use spool_core::plugin::{Plugin, PluginInstance, Producer, Registrable};
use spool_core::producer::{MessageHandler, ProducerBase};

use crate::common::ProducerMetrics;

/// Counting discard sink.
#[derive(Default)]
pub struct NullProducer {
    metrics: Arc<ProducerMetrics>,
}

impl NullProducer {
    /// Handle on this producer's metrics; stays valid after `produce`
    /// consumes the producer.
    pub fn metrics_handle(&self) -> Arc<ProducerMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Plugin for NullProducer {
    fn configure(&mut self, _conf: &mut PluginConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

struct NullHandler {
    metrics: Arc<ProducerMetrics>,
}

#[async_trait]
impl MessageHandler for NullHandler {
    async fn on_message(&mut self, message: Message) {
        self.metrics.message_received();
        self.metrics.messages_written(1, message.len() as u64);
    }
}

#[async_trait]
impl Producer for NullProducer {
    async fn produce(self: Box<Self>, mut base: ProducerBase) {
        let mut handler = NullHandler {
            metrics: Arc::clone(&self.metrics),
        };
        base.control_loop(&mut handler, None).await;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            messages = snapshot.messages_written,
            bytes = snapshot.bytes_written,
            "null producer stopped"
        );
    }
}

impl Registrable for NullProducer {
    const TYPE_NAME: &'static str = "producer.null";

    fn instance() -> PluginInstance {
        PluginInstance::Producer(Box::new(NullProducer::default()))
    }
}

#[cfg(test)]
#[path = "null_test.rs"]
mod null_test;
