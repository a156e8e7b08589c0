//! Router metrics
//!
//! Atomic counters tracking fan-out behavior, plus rate-limited logging
//! for message drops. All counters use relaxed ordering; values are
//! eventually consistent, not real-time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How often the drop tracker emits at most one summary line.
const DROP_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Drops per interval that escalate the summary to error level.
const CRITICAL_DROP_THRESHOLD: u64 = 100;

/// Metrics for the stream router.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Messages received from consumers
    messages_received: AtomicU64,

    /// Messages delivered to at least one producer
    messages_routed: AtomicU64,

    /// Messages delivered to no producer at all
    messages_dropped: AtomicU64,

    /// Messages rejected by a stream's filters
    messages_filtered: AtomicU64,

    /// Individual producer sends that succeeded
    sends_success: AtomicU64,

    /// Individual producer sends that failed (backpressure or closed)
    sends_failed: AtomicU64,

    /// Times a producer channel was full
    backpressure_events: AtomicU64,

    /// Total payload bytes received
    bytes_received: AtomicU64,
}

impl RouterMetrics {
    /// Create a metrics instance with all counters at zero.
    pub const fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_routed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            messages_filtered: AtomicU64::new(0),
            sends_success: AtomicU64::new(0),
            sends_failed: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Record a message entering the router.
    #[inline]
    pub fn record_received(&self, bytes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a message delivered to at least one producer.
    #[inline]
    pub fn record_routed(&self) {
        self.messages_routed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message that reached no producer.
    #[inline]
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message rejected by stream filters.
    #[inline]
    pub fn record_filtered(&self) {
        self.messages_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful send to a producer.
    #[inline]
    pub fn record_send_success(&self) {
        self.sends_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed send to a producer.
    #[inline]
    pub fn record_send_failed(&self) {
        self.sends_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a producer channel being full.
    #[inline]
    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_filtered: self.messages_filtered.load(Ordering::Relaxed),
            sends_success: self.sends_success.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the router counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_routed: u64,
    pub messages_dropped: u64,
    pub messages_filtered: u64,
    pub sends_success: u64,
    pub sends_failed: u64,
    pub backpressure_events: u64,
    pub bytes_received: u64,
}

impl MetricsSnapshot {
    /// Routing success rate (0.0 - 1.0); `None` before any traffic.
    pub fn routing_success_rate(&self) -> Option<f64> {
        if self.messages_received == 0 {
            None
        } else {
            Some(self.messages_routed as f64 / self.messages_received as f64)
        }
    }
}

/// Rate-limited drop logging.
///
/// Aggregates drop events and emits at most one summary line per second
/// instead of per-event logging, escalating to error level when the rate
/// indicates producers cannot keep up.
pub struct DropTracker {
    interval_drops: AtomicU64,
    /// Milliseconds since `epoch` of the last emitted summary.
    last_log_ms: AtomicU64,
    epoch: Instant,
}

impl Default for DropTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DropTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self {
            interval_drops: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Record dropped messages; emits a summary when the interval is up.
    /// Returns true if a log line was emitted.
    pub fn record_drop(&self, messages: u64) -> bool {
        self.interval_drops.fetch_add(messages, Ordering::Relaxed);
        self.maybe_log()
    }

    fn maybe_log(&self) -> bool {
        let now = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_log_ms.load(Ordering::Relaxed);

        if now.saturating_sub(last) < DROP_LOG_INTERVAL.as_millis() as u64 {
            return false;
        }

        // Claim the log slot so concurrent callers do not double-log.
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let drops = self.interval_drops.swap(0, Ordering::Relaxed);
        if drops == 0 {
            return false;
        }

        if drops > CRITICAL_DROP_THRESHOLD {
            tracing::error!(
                dropped_messages = drops,
                threshold = CRITICAL_DROP_THRESHOLD,
                "high backpressure: producers cannot keep up"
            );
        } else {
            tracing::warn!(
                dropped_messages = drops,
                "messages dropped in the last interval (producer backpressure)"
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = RouterMetrics::new();
        metrics.record_received(10);
        metrics.record_received(20);
        metrics.record_routed();
        metrics.record_dropped();
        metrics.record_send_success();
        metrics.record_send_failed();
        metrics.record_backpressure();
        metrics.record_filtered();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.bytes_received, 30);
        assert_eq!(snapshot.messages_routed, 1);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.messages_filtered, 1);
        assert_eq!(snapshot.sends_success, 1);
        assert_eq!(snapshot.sends_failed, 1);
        assert_eq!(snapshot.backpressure_events, 1);
    }

    #[test]
    fn success_rate_needs_traffic() {
        let metrics = RouterMetrics::new();
        assert!(metrics.snapshot().routing_success_rate().is_none());

        metrics.record_received(1);
        metrics.record_routed();
        assert_eq!(metrics.snapshot().routing_success_rate(), Some(1.0));
    }

    #[test]
    fn drop_tracker_rate_limits() {
        let tracker = DropTracker::new();
        // The interval starts at construction, so immediate drops only
        // accumulate.
        assert!(!tracker.record_drop(1));
        assert!(!tracker.record_drop(1));
    }
}
