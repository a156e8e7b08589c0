//! Shared producer metrics
//!
//! Atomic counters every producer maintains, with point-in-time
//! snapshots. Relaxed ordering throughout; values are eventually
//! consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics shared by all producer types.
#[derive(Debug, Default)]
pub struct ProducerMetrics {
    /// Messages received from the router
    messages_received: AtomicU64,

    /// Messages successfully written to the sink
    messages_written: AtomicU64,

    /// Payload bytes written to the sink
    bytes_written: AtomicU64,

    /// Messages dropped (oversize, retry exhausted)
    messages_dropped: AtomicU64,

    /// Failed writes or flushes
    write_errors: AtomicU64,

    /// Completed flush operations
    flush_count: AtomicU64,
}

impl ProducerMetrics {
    /// Create a metrics instance with all counters at zero.
    pub const fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        }
    }

    /// Record a message arriving from the router.
    #[inline]
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record messages written to the sink.
    #[inline]
    pub fn messages_written(&self, count: u64, bytes: u64) {
        self.messages_written.fetch_add(count, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a dropped message.
    #[inline]
    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed write or flush.
    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed flush.
    #[inline]
    pub fn flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> ProducerMetricsSnapshot {
        ProducerMetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_written: self.messages_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of producer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProducerMetricsSnapshot {
    pub messages_received: u64,
    pub messages_written: u64,
    pub bytes_written: u64,
    pub messages_dropped: u64,
    pub write_errors: u64,
    pub flush_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = ProducerMetrics::new();
        metrics.message_received();
        metrics.message_received();
        metrics.messages_written(2, 64);
        metrics.message_dropped();
        metrics.write_error();
        metrics.flush();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.messages_written, 2);
        assert_eq!(snapshot.bytes_written, 64);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.write_errors, 1);
        assert_eq!(snapshot.flush_count, 1);
    }
}
