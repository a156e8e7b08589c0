//! Spool - Producer plugins
//!
//! Sinks that take messages out of the pipeline: a console writer, a
//! batched file writer built on the double-buffered batcher, and a
//! counting null sink for benchmarks and tests.

pub mod common;
pub mod console;
pub mod file;
pub mod null;

pub use common::{ProducerMetrics, ProducerMetricsSnapshot};
pub use console::ConsoleProducer;
pub use file::FileProducer;
pub use null::NullProducer;
