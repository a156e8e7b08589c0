//! Batched file producer
//!
//! Appends formatted messages to a single file, aggregating them through
//! the double-buffered batcher so writers never block on disk I/O. A
//! flush ships one batch generation; flushes are triggered by
//! accumulated size, by age, and unconditionally on shutdown.
//!
//! Configuration example:
//!
//! ```toml
//! [[plugin]]
//! Type = "producer.file"
//! Stream = ["accesslog", "errorlog"]
//! File = "/var/log/spool/out.log"
//! BatchSizeByte = 8192
//! BatchSizeMaxKB = 128
//! BatchTimeoutSec = 5
//! Format = "format.envelope"
//!
//! [plugin.Category]
//! accesslog = "access"
//! ```
//!
//! `File` is mandatory. `BatchSizeByte` is the accumulated size that
//! triggers a flush; `BatchSizeMaxKB` caps one batch generation;
//! `BatchTimeoutSec` flushes a lingering batch by age. The optional
//! `Category` stream map prefixes each line with a per-stream label.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

use spool_core::batcher::{BatchedMessage, MessageBatch};
use spool_core::config::PluginConfig;
use spool_core::error::{ConfigError, ProducerError};
use spool_core::format::Formatter;
use spool_core::message::{Message, StreamId, WILDCARD_STREAM};
use spool_core::plugin::{Plugin, PluginInstance, Producer, Registrable};
use spool_core::producer::{MessageHandler, ProducerBase};

use crate::common::ProducerMetrics;

const DEFAULT_BATCH_SIZE_BYTE: i64 = 8192;
const DEFAULT_BATCH_MAX_KB: i64 = 128;
const DEFAULT_BATCH_TIMEOUT_SEC: i64 = 5;

/// Disk sink with double-buffered batching.
pub struct FileProducer {
    path: PathBuf,
    batch_trigger_size: usize,
    max_content_len: usize,
    batch_timeout: Duration,
    category: HashMap<StreamId, String>,
    metrics: Arc<ProducerMetrics>,
}

impl Default for FileProducer {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            batch_trigger_size: DEFAULT_BATCH_SIZE_BYTE as usize,
            max_content_len: (DEFAULT_BATCH_MAX_KB as usize) << 10,
            batch_timeout: Duration::from_secs(DEFAULT_BATCH_TIMEOUT_SEC as u64),
            category: HashMap::new(),
            metrics: Arc::new(ProducerMetrics::new()),
        }
    }
}

impl FileProducer {
    /// Handle on this producer's metrics.
    pub fn metrics_handle(&self) -> Arc<ProducerMetrics> {
        Arc::clone(&self.metrics)
    }
}

fn positive(conf: &PluginConfig, option: &'static str, default: i64) -> Result<i64, ConfigError> {
    let value = conf.get_int(option, default);
    if value <= 0 {
        return Err(ConfigError::invalid_option(
            "producer.file",
            option,
            format!("must be positive, got {value}"),
        ));
    }
    Ok(value)
}

impl Plugin for FileProducer {
    fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError> {
        if !conf.has_value("File") {
            return Err(ConfigError::missing_option("producer.file", "File"));
        }

        self.path = PathBuf::from(conf.get_string("File", ""));
        self.batch_trigger_size = positive(conf, "BatchSizeByte", DEFAULT_BATCH_SIZE_BYTE)? as usize;
        self.max_content_len =
            (positive(conf, "BatchSizeMaxKB", DEFAULT_BATCH_MAX_KB)? as usize) << 10;
        self.batch_timeout = Duration::from_secs(
            positive(conf, "BatchTimeoutSec", DEFAULT_BATCH_TIMEOUT_SEC)? as u64,
        );
        self.category = conf.get_stream_map("Category", "");
        Ok(())
    }
}

/// The file handle plus everything a flush worker needs to write a batch.
struct FileSink {
    path: PathBuf,
    handle: AsyncMutex<Option<fs::File>>,
    category: HashMap<StreamId, String>,
    metrics: Arc<ProducerMetrics>,
}

impl FileSink {
    /// Write one batch generation. The handle opens lazily and is
    /// recycled on error so the next flush retries from scratch.
    async fn write(&self, entries: Vec<BatchedMessage>) -> Result<(), ProducerError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut guard = self.handle.lock().await;
        if guard.is_none() {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|err| {
                    ProducerError::unavailable(format!("{}: {err}", self.path.display()))
                })?;
            *guard = Some(file);
        }

        // The handle exists here; the early return above covers the
        // open failure.
        let Some(file) = guard.as_mut() else {
            return Err(ProducerError::unavailable("file handle lost"));
        };

        match Self::write_entries(file, &self.category, &entries).await {
            Ok((count, bytes)) => {
                self.metrics.messages_written(count, bytes);
                self.metrics.flush();
                Ok(())
            }
            Err(err) => {
                *guard = None;
                Err(ProducerError::from(err))
            }
        }
    }

    async fn write_entries(
        file: &mut fs::File,
        category: &HashMap<StreamId, String>,
        entries: &[BatchedMessage],
    ) -> Result<(u64, u64), std::io::Error> {
        let mut count = 0u64;
        let mut bytes = 0u64;
        for entry in entries {
            let label = category
                .get(&entry.stream)
                .or_else(|| category.get(&WILDCARD_STREAM));
            if let Some(label) = label.filter(|l| !l.is_empty()) {
                file.write_all(label.as_bytes()).await?;
                file.write_all(b"\t").await?;
                bytes += (label.len() + 1) as u64;
            }
            file.write_all(&entry.payload).await?;
            count += 1;
            bytes += entry.payload.len() as u64;
        }
        file.flush().await?;
        Ok((count, bytes))
    }

    /// Drop the handle; the next flush reopens. Used on `Roll`.
    async fn close(&self) {
        *self.handle.lock().await = None;
    }
}

struct FileWriter {
    batch: Arc<MessageBatch>,
    sink: Arc<FileSink>,
    formatter: Box<dyn Formatter>,
    trigger: usize,
    timeout: Duration,
    metrics: Arc<ProducerMetrics>,
}

impl FileWriter {
    async fn flush(&self) {
        let sink = Arc::clone(&self.sink);
        let metrics = Arc::clone(&self.metrics);
        self.batch
            .flush(
                move |entries| async move { sink.write(entries).await },
                move |err| {
                    metrics.write_error();
                    tracing::error!(%err, "file flush failed");
                },
            )
            .await;
    }
}

#[async_trait]
impl MessageHandler for FileWriter {
    async fn on_message(&mut self, message: Message) {
        self.metrics.message_received();

        if !self.batch.append(&message, self.formatter.as_mut()) {
            // Active side is full: ship it and retry once into the fresh
            // generation.
            self.flush().await;
            self.batch.wait_for_flush().await;
            if !self.batch.append(&message, self.formatter.as_mut()) {
                self.metrics.message_dropped();
                tracing::warn!(
                    bytes = message.len(),
                    "dropping message that does not fit an empty batch"
                );
            }
        }

        if self.batch.reached_size_threshold(self.trigger) {
            self.flush().await;
        }
    }

    async fn on_tick(&mut self) {
        if self.batch.reached_time_threshold(self.timeout) {
            self.flush().await;
        }
    }

    async fn on_roll(&mut self) {
        self.flush().await;
        self.batch.wait_for_flush().await;
        self.sink.close().await;
        tracing::info!("file producer rolled, handle will reopen");
    }
}

#[async_trait]
impl Producer for FileProducer {
    async fn produce(self: Box<Self>, mut base: ProducerBase) {
        let sink = Arc::new(FileSink {
            path: self.path.clone(),
            handle: AsyncMutex::new(None),
            category: self.category.clone(),
            metrics: Arc::clone(&self.metrics),
        });

        let mut writer = FileWriter {
            batch: Arc::new(MessageBatch::new(self.max_content_len)),
            sink,
            formatter: base.take_formatter(),
            trigger: self.batch_trigger_size,
            timeout: self.batch_timeout,
            metrics: Arc::clone(&self.metrics),
        };

        base.control_loop(&mut writer, Some(self.batch_timeout)).await;

        // Drained messages are in the batcher now; ship the tail.
        writer.flush().await;
        writer.batch.wait_for_flush().await;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            file = %self.path.display(),
            messages = snapshot.messages_written,
            bytes = snapshot.bytes_written,
            flushes = snapshot.flush_count,
            write_errors = snapshot.write_errors,
            "file producer stopped"
        );
    }
}

impl Registrable for FileProducer {
    const TYPE_NAME: &'static str = "producer.file";

    fn instance() -> PluginInstance {
        PluginInstance::Producer(Box::new(FileProducer::default()))
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod file_test;
