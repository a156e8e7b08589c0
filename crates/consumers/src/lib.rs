//! Spool - Consumer plugins
//!
//! Sources that feed the pipeline: a tailing file reader with resumable
//! offsets and a console (stdin) reader. Both frame their input with the
//! shared buffered delimited reader and emit messages through their
//! consumer base.

pub mod console;
pub mod file;

pub use console::ConsoleConsumer;
pub use file::FileConsumer;
