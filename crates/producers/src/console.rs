//! Console producer
//!
//! Writes formatted messages to standard output. The counterpart of the
//! console consumer for development pipelines and quick checks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use spool_core::config::PluginConfig;
use spool_core::error::ConfigError;
use spool_core::format::Formatter;
use spool_core::message::Message;
use spool_core::plugin::{Plugin, PluginInstance, Producer, Registrable};
use spool_core::producer::{MessageHandler, ProducerBase};

use crate::common::ProducerMetrics;

/// Stdout sink.
#[derive(Default)]
pub struct ConsoleProducer {
    metrics: Arc<ProducerMetrics>,
}

impl ConsoleProducer {
    /// Handle on this producer's metrics.
    pub fn metrics_handle(&self) -> Arc<ProducerMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Plugin for ConsoleProducer {
    fn configure(&mut self, _conf: &mut PluginConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

struct ConsoleHandler {
    stdout: tokio::io::Stdout,
    formatter: Box<dyn Formatter>,
    metrics: Arc<ProducerMetrics>,
    log_write_error: bool,
}

#[async_trait]
impl MessageHandler for ConsoleHandler {
    async fn on_message(&mut self, message: Message) {
        self.metrics.message_received();
        self.formatter.prepare_message(&message);
        let payload = self.formatter.bytes();

        let result = async {
            self.stdout.write_all(&payload).await?;
            self.stdout.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.metrics.messages_written(1, payload.len() as u64);
                self.log_write_error = true;
            }
            Err(err) => {
                self.metrics.write_error();
                // One line per failure streak.
                if self.log_write_error {
                    tracing::error!(%err, "cannot write to stdout");
                    self.log_write_error = false;
                }
            }
        }
    }
}

#[async_trait]
impl Producer for ConsoleProducer {
    async fn produce(self: Box<Self>, mut base: ProducerBase) {
        let mut handler = ConsoleHandler {
            stdout: tokio::io::stdout(),
            formatter: base.take_formatter(),
            metrics: Arc::clone(&self.metrics),
            log_write_error: true,
        };
        base.control_loop(&mut handler, None).await;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            messages = snapshot.messages_written,
            bytes = snapshot.bytes_written,
            write_errors = snapshot.write_errors,
            "console producer stopped"
        );
    }
}

impl Registrable for ConsoleProducer {
    const TYPE_NAME: &'static str = "producer.console";

    fn instance() -> PluginInstance {
        PluginInstance::Producer(Box::new(ConsoleProducer::default()))
    }
}
