//! Tailing file consumer
//!
//! Follows one file forever, translating its byte stream into messages
//! via the buffered delimited reader. Three seek modes are supported:
//! read from the start, follow new appends only, or resume from a
//! persisted byte offset.
//!
//! Configuration example:
//!
//! ```toml
//! [[plugin]]
//! Type = "consumer.file"
//! Stream = "accesslog"
//! File = "/var/log/access.log"
//! Offset = "Current"
//! Delimiter = "\\n"
//! ```
//!
//! `File` is mandatory. The file is read to the end and the reader stays
//! attached, so appends keep flowing. The symlink (if any) is resolved
//! once per open cycle; retargeting it requires a restart or a `Roll`.
//!
//! `Offset` is one of `Start`, `End` (default) or `Current`. With
//! `Current`, an index file next to the configured `IndexDir` (default
//! `/tmp`) records the last byte offset handed downstream, and a restart
//! resumes there. A missing or unparsable index restarts from offset 0.
//!
//! `Delimiter` separates messages, default `"\n"`; the escapes `\n`,
//! `\r` and `\t` are honored.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::{AsyncSeekExt, SeekFrom};

use spool_core::config::{unescape, PluginConfig};
use spool_core::consumer::{ConsumerBase, MessageEmitter};
use spool_core::control::Worker;
use spool_core::error::{ConfigError, ReaderError};
use spool_core::plugin::{Consumer, Plugin, PluginInstance, Registrable};
use spool_core::reader::{BufferedReader, BUFFER_GROW_SIZE};

/// Back-off between attempts to open an unreadable file.
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(3);

const OFFSET_START: &str = "Start";
const OFFSET_END: &str = "End";
const OFFSET_CURRENT: &str = "Current";

/// Tail states. Only the tail task moves `Open -> Read`; the control
/// loop moves back to `Open` on roll/reconfigure and to `Done` on stop.
const STATE_OPEN: u8 = 0;
const STATE_READ: u8 = 1;
const STATE_DONE: u8 = 2;

/// Where to start reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekMode {
    Start,
    End,
    Current,
}

/// Options the tail task snapshots on every open cycle.
#[derive(Debug, Clone)]
struct TailSettings {
    file: String,
    delimiter: Vec<u8>,
    seek: SeekMode,
    persist: bool,
    index_dir: PathBuf,
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            file: String::new(),
            delimiter: b"\n".to_vec(),
            seek: SeekMode::End,
            persist: false,
            index_dir: PathBuf::from("/tmp"),
        }
    }
}

/// File consumer plugin.
pub struct FileConsumer {
    settings: Arc<Mutex<TailSettings>>,
    state: Arc<AtomicU8>,
}

impl Default for FileConsumer {
    fn default() -> Self {
        Self {
            settings: Arc::new(Mutex::new(TailSettings::default())),
            state: Arc::new(AtomicU8::new(STATE_OPEN)),
        }
    }
}

fn apply_settings(
    settings: &Mutex<TailSettings>,
    conf: &mut PluginConfig,
) -> Result<(), ConfigError> {
    if !conf.has_value("File") {
        return Err(ConfigError::missing_option("consumer.file", "File"));
    }

    let delimiter = unescape(&conf.get_string("Delimiter", "\n")).into_bytes();
    if delimiter.is_empty() {
        return Err(ConfigError::invalid_option(
            "consumer.file",
            "Delimiter",
            "must not be empty",
        ));
    }

    let seek = match conf.get_string("Offset", OFFSET_END).as_str() {
        OFFSET_START => SeekMode::Start,
        OFFSET_CURRENT => SeekMode::Current,
        _ => SeekMode::End,
    };

    *settings.lock() = TailSettings {
        file: conf.get_string("File", ""),
        delimiter,
        seek,
        persist: seek == SeekMode::Current,
        index_dir: PathBuf::from(conf.get_string("IndexDir", "/tmp")),
    };
    Ok(())
}

impl Plugin for FileConsumer {
    fn configure(&mut self, conf: &mut PluginConfig) -> Result<(), ConfigError> {
        apply_settings(&self.settings, conf)
    }
}

#[async_trait]
impl Consumer for FileConsumer {
    async fn consume(self: Box<Self>, base: ConsumerBase) {
        let (emitter, mut control, worker) = base.split();
        self.state.store(STATE_OPEN, Ordering::Release);

        tokio::spawn(tail(
            Arc::clone(&self.settings),
            Arc::clone(&self.state),
            emitter,
            worker,
        ));

        let roll_state = Arc::clone(&self.state);
        let state = &self.state;
        let settings = &self.settings;
        control
            .run(
                || roll_state.store(STATE_OPEN, Ordering::Release),
                |mut node| {
                    if let Err(err) = apply_settings(settings, &mut node) {
                        tracing::error!(%err, "reconfigure failed, keeping previous settings");
                    }
                    state.store(STATE_OPEN, Ordering::Release);
                },
            )
            .await;

        self.state.store(STATE_DONE, Ordering::Release);
    }
}

impl Registrable for FileConsumer {
    const TYPE_NAME: &'static str = "consumer.file";

    fn instance() -> PluginInstance {
        PluginInstance::Consumer(Box::new(FileConsumer::default()))
    }
}

/// The tail task: owns the file handle and the buffered reader, runs
/// until the state turns `Done`, then drains and releases its worker.
async fn tail(
    settings: Arc<Mutex<TailSettings>>,
    state: Arc<AtomicU8>,
    emitter: MessageEmitter,
    worker: Worker,
) {
    let mut reader = BufferedReader::new(BUFFER_GROW_SIZE, 0, b"\n".to_vec());
    let mut file: Option<fs::File> = None;
    let mut real_name = PathBuf::new();
    let mut index_path: Option<PathBuf> = None;
    let mut seek_offset: u64 = 0;
    let mut seek = SeekMode::End;
    let mut delimiter_len = 1;
    let mut log_open_error = true;

    loop {
        match state.load(Ordering::Acquire) {
            STATE_DONE => break,
            STATE_OPEN => {
                // Pull any frames completed before the switch, then drop
                // the handle.
                if let Some(handle) = file.as_mut() {
                    let _ = deliver(
                        &mut reader,
                        handle,
                        &emitter,
                        &mut seek_offset,
                        delimiter_len,
                        index_path.as_deref(),
                    )
                    .await;
                }
                file = None;

                let snapshot = settings.lock().clone();
                seek = snapshot.seek;
                delimiter_len = snapshot.delimiter.len();
                reader = BufferedReader::new(BUFFER_GROW_SIZE, 0, snapshot.delimiter);

                // The symlink is resolved here and nowhere else; changing
                // its target takes effect on the next open cycle.
                real_name = resolve_path(&snapshot.file).await;

                index_path = if snapshot.persist {
                    Some(index_file_path(&snapshot.index_dir, &real_name))
                } else {
                    None
                };
                if let Some(path) = &index_path {
                    // The offset is zeroed before the index is consulted:
                    // a missing or unparsable record restarts the file
                    // rather than trusting a stale in-memory value.
                    seek_offset = 0;
                    if let Ok(text) = fs::read_to_string(path).await {
                        if let Ok(offset) = text.trim().parse::<u64>() {
                            seek_offset = offset;
                        }
                    }
                }
                reader.reset(seek_offset);

                // Lost to a concurrent stop; the next loop pass exits.
                let _ = state.compare_exchange(
                    STATE_OPEN,
                    STATE_READ,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
            _ => {
                if file.is_none() {
                    match fs::OpenOptions::new().read(true).open(&real_name).await {
                        Err(err) => {
                            // One line per failure streak.
                            if log_open_error {
                                tracing::error!(
                                    file = %real_name.display(),
                                    %err,
                                    "cannot open file"
                                );
                                log_open_error = false;
                            }
                            tokio::time::sleep(OPEN_RETRY_DELAY).await;
                            continue;
                        }
                        Ok(mut handle) => {
                            let seek_to = match seek {
                                SeekMode::End => SeekFrom::End(0),
                                SeekMode::Start | SeekMode::Current => {
                                    SeekFrom::Start(seek_offset)
                                }
                            };
                            match handle.seek(seek_to).await {
                                Ok(position) => {
                                    seek_offset = position;
                                    reader.reset(seek_offset);
                                    log_open_error = true;
                                    file = Some(handle);
                                }
                                Err(err) => {
                                    tracing::error!(%err, "cannot seek file");
                                    tokio::time::sleep(OPEN_RETRY_DELAY).await;
                                }
                            }
                        }
                    }
                }

                if let Some(handle) = file.as_mut() {
                    match deliver(
                        &mut reader,
                        handle,
                        &emitter,
                        &mut seek_offset,
                        delimiter_len,
                        index_path.as_deref(),
                    )
                    .await
                    {
                        Ok(()) => {}
                        // No new data yet; this is the follow behavior.
                        Err(ReaderError::Eof) => tokio::task::yield_now().await,
                        Err(err) => {
                            if state.load(Ordering::Acquire) == STATE_READ {
                                tracing::error!(%err, "error reading file");
                            }
                            file = None;
                        }
                    }
                }
            }
        }
    }

    // Final drain before the worker signs off.
    if let Some(handle) = file.as_mut() {
        let _ = deliver(
            &mut reader,
            handle,
            &emitter,
            &mut seek_offset,
            delimiter_len,
            index_path.as_deref(),
        )
        .await;
    }
    worker.mark_as_done();
}

/// One read step: extract frames, post them downstream, persist the
/// offset after the last delivered delimiter when an index is configured.
async fn deliver(
    reader: &mut BufferedReader,
    handle: &mut fs::File,
    emitter: &MessageEmitter,
    seek_offset: &mut u64,
    delimiter_len: usize,
    index_path: Option<&Path>,
) -> Result<(), ReaderError> {
    let before = *seek_offset;
    {
        let mut on_frame = |payload: &[u8], sequence: u64| {
            *seek_offset += (payload.len() + delimiter_len) as u64;
            emitter.post_from_slice(payload, sequence);
        };
        reader.read(handle, &mut on_frame).await?;
    }

    if *seek_offset != before {
        if let Some(path) = index_path {
            // Write failures are silent; the next success overwrites.
            let _ = fs::write(path, seek_offset.to_string()).await;
        }
    }
    Ok(())
}

/// Resolve symlinks and relative paths to the file's canonical name.
/// Falls back to the configured spelling when resolution fails (the file
/// may simply not exist yet).
async fn resolve_path(configured: &str) -> PathBuf {
    match fs::canonicalize(configured).await {
        Ok(path) => path,
        Err(_) => {
            std::path::absolute(configured).unwrap_or_else(|_| PathBuf::from(configured))
        }
    }
}

/// Index file path for a resolved source path: `/` and `.` replaced so
/// the offset record is a flat file under the index directory.
fn index_file_path(index_dir: &Path, real_name: &Path) -> PathBuf {
    let mangled = real_name.to_string_lossy().replace(['/', '.'], "_");
    index_dir.join(format!("spool{mangled}.idx"))
}

#[cfg(test)]
#[path = "file_test.rs"]
mod file_test;
