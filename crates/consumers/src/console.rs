//! Console consumer
//!
//! Reads delimiter-framed messages from standard input. Mostly useful
//! for piping data into the pipeline during development and for quick
//! end-to-end checks.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use spool_core::config::{unescape, PluginConfig};
use spool_core::consumer::ConsumerBase;
use spool_core::error::{ConfigError, ReaderError};
use spool_core::plugin::{Consumer, Plugin, PluginInstance, Registrable};
use spool_core::reader::{BufferedReader, BUFFER_GROW_SIZE};

/// Console (stdin) consumer plugin.
///
/// Options: `Delimiter` (default `"\n"`, escapes honored). Reading ends
/// at stdin EOF or on stop.
pub struct ConsoleConsumer {
    delimiter: Vec<u8>,
}

impl Default for ConsoleConsumer {
    fn default() -> Self {
        Self {
            delimiter: b"\n".to_vec(),
        }
    }
}

impl Plugin for ConsoleConsumer {
    fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError> {
        let delimiter = unescape(&conf.get_string("Delimiter", "\n")).into_bytes();
        if delimiter.is_empty() {
            return Err(ConfigError::invalid_option(
                "consumer.console",
                "Delimiter",
                "must not be empty",
            ));
        }
        self.delimiter = delimiter;
        Ok(())
    }
}

#[async_trait]
impl Consumer for ConsoleConsumer {
    async fn consume(self: Box<Self>, base: ConsumerBase) {
        let (emitter, mut control, worker) = base.split();
        let token = CancellationToken::new();

        let reader_token = token.clone();
        let delimiter = self.delimiter.clone();
        tokio::spawn(async move {
            let mut stdin = tokio::io::stdin();
            let mut reader = BufferedReader::new(BUFFER_GROW_SIZE, 0, delimiter);
            let mut on_frame = |payload: &[u8], sequence: u64| {
                emitter.post_from_slice(payload, sequence);
            };

            loop {
                tokio::select! {
                    _ = reader_token.cancelled() => break,
                    result = reader.read(&mut stdin, &mut on_frame) => match result {
                        Ok(()) => {}
                        Err(ReaderError::Eof) => {
                            tracing::info!("stdin closed, console consumer finishing");
                            break;
                        }
                        Err(err) => {
                            tracing::error!(%err, "error reading stdin");
                            break;
                        }
                    },
                }
            }
            worker.mark_as_done();
        });

        control.run(|| {}, |_| {}).await;
        token.cancel();
    }
}

impl Registrable for ConsoleConsumer {
    const TYPE_NAME: &'static str = "consumer.console";

    fn instance() -> PluginInstance {
        PluginInstance::Consumer(Box::new(ConsoleConsumer::default()))
    }
}
