//! Router - stream fan-out with filters
//!
//! The `Router` receives messages from consumers and offers them to the
//! producers bound to the originating stream and to the wildcard stream.
//! Stream filters run before any producer is offered the message.

use std::collections::HashMap;
use std::sync::Arc;

use spool_core::filter::Filter;
use spool_core::{Message, StreamId, WILDCARD_STREAM};
use tokio::sync::mpsc;

use crate::handle::ProducerHandle;
use crate::metrics::{DropTracker, MetricsSnapshot, RouterMetrics};

/// Routing state of one stream: its filters and bound producers.
#[derive(Default)]
struct StreamRoute {
    name: String,
    filters: Vec<Box<dyn Filter>>,
    producers: Vec<ProducerHandle>,
}

/// Fan-out router connecting consumers to producers.
///
/// # Design
///
/// - Receives `Message` values via one input channel
/// - Looks up the originating stream and the wildcard stream
/// - Applies each stream's filters before offering to its producers
/// - Non-blocking `try_send` per producer with backpressure accounting
pub struct Router {
    routes: HashMap<StreamId, StreamRoute>,
    metrics: Arc<RouterMetrics>,
    drop_tracker: DropTracker,
}

/// Handle for reading router metrics after `run()` consumed the router.
#[derive(Clone)]
pub struct RouterMetricsHandle {
    metrics: Arc<RouterMetrics>,
}

impl RouterMetricsHandle {
    /// Point-in-time snapshot of the router counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            metrics: Arc::new(RouterMetrics::new()),
            drop_tracker: DropTracker::new(),
        }
    }

    /// Get a metrics handle that stays valid after `run()` consumes the
    /// router.
    pub fn metrics_handle(&self) -> RouterMetricsHandle {
        RouterMetricsHandle {
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Bind a producer to a stream by name.
    pub fn bind_producer(&mut self, stream_name: &str, handle: ProducerHandle) {
        tracing::debug!(
            stream = stream_name,
            producer = handle.name(),
            "bound producer to stream"
        );
        self.route_entry(stream_name).producers.push(handle);
    }

    /// Attach a filter to a stream by name.
    pub fn add_filter(&mut self, stream_name: &str, filter: Box<dyn Filter>) {
        self.route_entry(stream_name).filters.push(filter);
    }

    /// Number of producers bound to a stream.
    pub fn producer_count(&self, stream_name: &str) -> usize {
        self.routes
            .get(&StreamId::from_name(stream_name))
            .map(|route| route.producers.len())
            .unwrap_or(0)
    }

    /// Number of streams with at least one producer or filter.
    pub fn stream_count(&self) -> usize {
        self.routes.len()
    }

    fn route_entry(&mut self, stream_name: &str) -> &mut StreamRoute {
        self.routes
            .entry(StreamId::from_name(stream_name))
            .or_insert_with(|| StreamRoute {
                name: stream_name.to_string(),
                ..Default::default()
            })
    }

    /// Route one message: offer it to the originating stream's producers
    /// and to wildcard-bound producers, filters permitting.
    ///
    /// Returns the number of producers that accepted the message.
    pub fn dispatch(&self, message: &Message) -> usize {
        self.metrics.record_received(message.len() as u64);

        let mut delivered = 0;
        if let Some(route) = self.routes.get(&message.stream_id()) {
            delivered += self.offer(route, message);
        }
        if message.stream_id() != WILDCARD_STREAM {
            if let Some(route) = self.routes.get(&WILDCARD_STREAM) {
                delivered += self.offer(route, message);
            }
        }

        if delivered > 0 {
            self.metrics.record_routed();
        } else {
            self.metrics.record_dropped();
        }
        delivered
    }

    fn offer(&self, route: &StreamRoute, message: &Message) -> usize {
        if !route.filters.iter().all(|filter| filter.accepts(message)) {
            self.metrics.record_filtered();
            return 0;
        }

        let mut sent = 0;
        for handle in &route.producers {
            if handle.is_closed() {
                tracing::warn!(
                    stream = %route.name,
                    producer = handle.name(),
                    "producer channel closed, skipping"
                );
                self.metrics.record_send_failed();
                continue;
            }

            match handle.try_send(message.clone()) {
                Ok(()) => {
                    self.metrics.record_send_success();
                    sent += 1;
                }
                Err(_) => {
                    self.metrics.record_backpressure();
                    self.metrics.record_send_failed();
                    self.drop_tracker.record_drop(1);
                    tracing::debug!(
                        stream = %route.name,
                        producer = handle.name(),
                        capacity = handle.capacity(),
                        "producer channel full (backpressure)"
                    );
                }
            }
        }
        sent
    }

    /// Run the router until the input channel closes.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<Message>) {
        tracing::info!(
            stream_count = self.stream_count(),
            "router starting"
        );

        while let Some(message) = receiver.recv().await {
            self.dispatch(&message);
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            messages_received = snapshot.messages_received,
            messages_routed = snapshot.messages_routed,
            messages_dropped = snapshot.messages_dropped,
            messages_filtered = snapshot.messages_filtered,
            backpressure_events = snapshot.backpressure_events,
            bytes_received = snapshot.bytes_received,
            "router shutting down"
        );
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("stream_count", &self.stream_count())
            .finish()
    }
}
