//! Producer handle for pipeline communication
//!
//! `ProducerHandle` wraps a channel sender and producer name, allowing the
//! router to offer messages to producers without knowing their concrete
//! types. Cloning a handle is cheap, so one producer can be bound to many
//! streams.

use spool_core::Message;
use tokio::sync::mpsc;

/// Handle to a producer for sending messages.
///
/// Each producer creates one message channel during wiring; the sending
/// half is wrapped in a handle and registered with the router once per
/// stream the producer is bound to.
#[derive(Clone)]
pub struct ProducerHandle {
    name: String,
    sender: mpsc::Sender<Message>,
}

impl ProducerHandle {
    /// Create a new producer handle.
    #[inline]
    pub fn new(name: impl Into<String>, sender: mpsc::Sender<Message>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// Human-readable producer name for logging and metrics.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to send a message without blocking.
    ///
    /// Fails when the channel is full (backpressure) or closed.
    #[inline]
    pub fn try_send(&self, message: Message) -> Result<(), Message> {
        self.sender.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(m) => m,
            mpsc::error::TrySendError::Closed(m) => m,
        })
    }

    /// Whether the producer's channel is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Remaining capacity of the producer's channel.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
