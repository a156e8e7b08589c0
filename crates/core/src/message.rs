//! Message and stream identity types
//!
//! A `Message` is the unit of data flowing through the pipeline: an opaque
//! payload tagged with the stream it was ingested on, a per-consumer
//! sequence number and the wall-clock ingest time. Cloning a message is
//! cheap because the payload is a reference-counted `bytes::Bytes`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use xxhash_rust::xxh3::xxh3_64;

/// Stable 64-bit identifier of a named stream.
///
/// Regular streams hash their name with xxh3; a handful of ids are
/// reserved and never produced by hashing user-facing names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

/// Matches any stream in routing tables.
pub const WILDCARD_STREAM: StreamId = StreamId(0);

/// Carries the pipeline's own log output.
pub const INTERNAL_LOG_STREAM: StreamId = StreamId(1);

/// Receives messages that could not be routed anywhere.
pub const DROPPED_STREAM: StreamId = StreamId(2);

/// Name of the wildcard stream in configuration documents.
pub const WILDCARD_STREAM_NAME: &str = "*";

/// Name of the internal log stream in configuration documents.
pub const INTERNAL_LOG_STREAM_NAME: &str = "_SPOOL_";

/// Name of the dropped-message stream in configuration documents.
pub const DROPPED_STREAM_NAME: &str = "_DROPPED_";

impl StreamId {
    /// Derive the id for a stream name.
    ///
    /// Reserved names (`*`, `_SPOOL_`, `_DROPPED_`) map onto their fixed
    /// ids; everything else is hashed.
    pub fn from_name(name: &str) -> Self {
        match name {
            WILDCARD_STREAM_NAME => WILDCARD_STREAM,
            INTERNAL_LOG_STREAM_NAME => INTERNAL_LOG_STREAM,
            DROPPED_STREAM_NAME => DROPPED_STREAM,
            _ => StreamId(xxh3_64(name.as_bytes())),
        }
    }

    /// Raw 64-bit value, for logging and map keys.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A single record flowing through the pipeline.
///
/// Immutable once emitted. For any two messages emitted by the same
/// consumer, the one with the larger sequence number was produced no
/// earlier than the other.
#[derive(Debug, Clone)]
pub struct Message {
    payload: Bytes,
    stream: StreamId,
    sequence: u64,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current wall-clock time.
    pub fn new(payload: Bytes, stream: StreamId, sequence: u64) -> Self {
        Self {
            payload,
            stream,
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Copy a byte slice into a new message.
    pub fn from_slice(payload: &[u8], stream: StreamId, sequence: u64) -> Self {
        Self::new(Bytes::copy_from_slice(payload), stream, sequence)
    }

    /// The opaque payload.
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The stream this message was ingested on.
    #[inline]
    pub fn stream_id(&self) -> StreamId {
        self.stream
    }

    /// Per-consumer sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wall-clock time at ingest.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Re-tag the message for another stream, sharing the payload.
    pub fn routed_to(&self, stream: StreamId) -> Self {
        Self {
            payload: self.payload.clone(),
            stream,
            sequence: self.sequence,
            timestamp: self.timestamp,
        }
    }
}
