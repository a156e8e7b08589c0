//! Double-buffered message batcher
//!
//! Lets many producer tasks append formatted entries at wire rate while a
//! single background flusher ships the previous generation. Coordination
//! is a packed 32-bit word: the top bit selects the active side, the low
//! 31 bits count writers that have acquired a slot. Appending is a single
//! atomic add; flushing is a single atomic swap that both switches sides
//! and reserves a fresh generation. Appenders never touch the flush
//! mutex.

use std::cell::UnsafeCell;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::ProducerError;
use crate::format::Formatter;
use crate::message::{Message, StreamId};

/// Amount the slot arrays grow by when a writer lands past the end.
pub const BATCH_GROW_SIZE: usize = 256;

/// Top bit of the coordination word: index of the active side.
const ACTIVE_FLAG: u32 = 1 << 31;

/// Low 31 bits of the coordination word: writers on the active side.
const WRITER_MASK: u32 = ACTIVE_FLAG - 1;

/// One formatted entry awaiting flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchedMessage {
    /// Stream the original message arrived on.
    pub stream: StreamId,
    /// Formatted payload, ready for the sink.
    pub payload: Bytes,
}

/// A slot holding at most one entry.
///
/// Each slot is written by exactly one appender (indices are handed out
/// by the coordination word) and read by the flusher only after the
/// side's `done_count` has reached its writer count.
struct Slot(UnsafeCell<Option<BatchedMessage>>);

unsafe impl Sync for Slot {}

impl Slot {
    fn empty() -> Self {
        Slot(UnsafeCell::new(None))
    }

    fn filled(entry: BatchedMessage) -> Self {
        Slot(UnsafeCell::new(Some(entry)))
    }
}

/// One side of the double buffer.
struct BatchQueue {
    /// Entry slots. The read lock covers appender writes (one writer per
    /// slot); the write lock is only taken to grow the array.
    slots: RwLock<Vec<Slot>>,
    /// Writers that completed their reservation, successful or not.
    done_count: AtomicU32,
    /// Accumulated payload bytes on this side.
    content_len: AtomicUsize,
}

impl BatchQueue {
    fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::with_capacity(BATCH_GROW_SIZE)),
            done_count: AtomicU32::new(0),
            content_len: AtomicUsize::new(0),
        }
    }
}

/// Marks a slot reservation complete on every exit path, so the flusher
/// never waits on a slot that was refused.
struct DoneGuard<'a>(&'a AtomicU32);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Release);
    }
}

/// Double-buffered aggregation buffer shared between producer writers and
/// a single flusher.
pub struct MessageBatch {
    queue: [BatchQueue; 2],
    active_set: AtomicU32,
    max_content_len: usize,
    last_flush_ns: Arc<AtomicU64>,
    created: Instant,
    flushing: Arc<AsyncMutex<()>>,
}

impl MessageBatch {
    /// Create a batcher whose sides hold at most `max_content_len`
    /// payload bytes.
    pub fn new(max_content_len: usize) -> Self {
        Self {
            queue: [BatchQueue::new(), BatchQueue::new()],
            active_set: AtomicU32::new(0),
            max_content_len,
            last_flush_ns: Arc::new(AtomicU64::new(0)),
            created: Instant::now(),
            flushing: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Maximum payload bytes per side.
    #[inline]
    pub fn max_content_len(&self) -> usize {
        self.max_content_len
    }

    /// Format `message` once and append it to the active side.
    ///
    /// Returns `false` when the active side is full; the caller should
    /// flush and retry. Messages larger than the batcher itself are
    /// logged and reported as accepted so callers do not retry forever.
    pub fn append(&self, message: &Message, format: &mut dyn Formatter) -> bool {
        let set = self.active_set.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let queue = &self.queue[(set >> 31) as usize];
        let slot = ((set & WRITER_MASK) - 1) as usize;

        // The reservation completes even when the write is refused.
        let _done = DoneGuard(&queue.done_count);

        format.prepare_message(message);
        let message_len = format.len();

        if message_len > self.max_content_len {
            tracing::error!(
                bytes = message_len,
                limit = self.max_content_len,
                "message exceeds batch capacity, dropping"
            );
            return true;
        }

        // Reserve content space; refuse when this side would overflow.
        let mut content_len = queue.content_len.load(Ordering::Relaxed);
        loop {
            if content_len + message_len >= self.max_content_len {
                return false;
            }
            match queue.content_len.compare_exchange_weak(
                content_len,
                content_len + message_len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => content_len = observed,
            }
        }

        self.store(
            queue,
            slot,
            BatchedMessage {
                stream: message.stream_id(),
                payload: format.bytes(),
            },
        );
        true
    }

    fn store(&self, queue: &BatchQueue, index: usize, entry: BatchedMessage) {
        {
            let slots = queue.slots.read();
            if index < slots.len() {
                // Safety: slot indices are handed out exactly once by the
                // coordination word, so no other thread writes this slot,
                // and the flusher reads it only after observing this
                // writer's done_count increment (Release/Acquire pair).
                unsafe { *slots[index].0.get() = Some(entry) };
                return;
            }
        }

        // Grow path: exclusive access, plain writes.
        let mut slots = queue.slots.write();
        if index >= slots.len() {
            let target = index + BATCH_GROW_SIZE;
            slots.resize_with(target, Slot::empty);
        }
        slots[index] = Slot::filled(entry);
    }

    /// Ship the current generation to `sink` on a background task.
    ///
    /// Switches sides with one atomic swap so writers carry on
    /// undisturbed, waits for appenders that already reserved a slot
    /// (bounded by one format call each), then launches the flush worker.
    /// At most one flush is in flight at any time; errors go to
    /// `on_error`.
    pub async fn flush<S, F, E>(&self, sink: S, on_error: E)
    where
        S: FnOnce(Vec<BatchedMessage>) -> F + Send + 'static,
        F: Future<Output = Result<(), ProducerError>> + Send + 'static,
        E: FnOnce(ProducerError) + Send + 'static,
    {
        if self.is_empty() {
            return;
        }

        let guard = Arc::clone(&self.flushing).lock_owned().await;

        // Toggle the side and reserve a fresh writer generation in one
        // swap. Only the flusher changes the top bit, and flushers are
        // serialized by the mutex, so the load/swap pair is sound.
        let current = self.active_set.load(Ordering::Acquire);
        let next = if current & ACTIVE_FLAG != 0 { 0 } else { ACTIVE_FLAG };
        let flush_set = self.active_set.swap(next, Ordering::AcqRel);
        let flush_index = (flush_set >> 31) as usize;
        let writer_count = flush_set & WRITER_MASK;
        let queue = &self.queue[flush_index];

        // Wait for writers that already acquired a slot. Appending never
        // suspends between reservation and completion, so this window is
        // bounded by in-flight format calls on other threads.
        loop {
            let done = queue.done_count.load(Ordering::Acquire);
            assert!(
                done <= writer_count,
                "batch writer accounting out of sync ({done} > {writer_count})"
            );
            if done == writer_count {
                break;
            }
            std::hint::spin_loop();
        }

        let entries = Self::collect(queue, writer_count as usize);
        queue.content_len.store(0, Ordering::Relaxed);
        queue.done_count.store(0, Ordering::Relaxed);

        let last_flush_ns = Arc::clone(&self.last_flush_ns);
        let created = self.created;
        tokio::spawn(async move {
            let result = sink(entries).await;
            last_flush_ns.store(created.elapsed().as_nanos() as u64, Ordering::Relaxed);
            if let Err(err) = result {
                on_error(err);
            }
            drop(guard);
        });
    }

    fn collect(queue: &BatchQueue, writer_count: usize) -> Vec<BatchedMessage> {
        let slots = queue.slots.read();
        // Refused writers leave their slot empty (possibly past the end
        // of the array); honoring writer_count skips nothing real.
        let limit = writer_count.min(slots.len());
        (0..limit)
            .filter_map(|index| {
                // Safety: this side is quiescent. Writers moved to the
                // other side at the swap, and every reserved slot was
                // published before done_count reached writer_count.
                unsafe { (*slots[index].0.get()).take() }
            })
            .collect()
    }

    /// Block until no flush is in flight.
    pub async fn wait_for_flush(&self) {
        let _guard = self.flushing.lock().await;
    }

    /// Whether no writer has appended to the active side.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active_set.load(Ordering::Acquire) & WRITER_MASK == 0
    }

    /// Whether the active side holds at least `size` payload bytes.
    pub fn reached_size_threshold(&self, size: usize) -> bool {
        let active = (self.active_set.load(Ordering::Acquire) >> 31) as usize;
        self.queue[active].content_len.load(Ordering::Relaxed) >= size
    }

    /// Whether the batcher is non-empty and the last flush completed more
    /// than `timeout` ago.
    pub fn reached_time_threshold(&self, timeout: Duration) -> bool {
        if self.is_empty() {
            return false;
        }
        let last = Duration::from_nanos(self.last_flush_ns.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last) > timeout
    }
}

#[cfg(test)]
#[path = "batcher_test.rs"]
mod batcher_test;
