//! Buffered delimited reader
//!
//! Extracts delimiter-framed messages from an arbitrary byte source while
//! growing a single backing buffer on demand. Frames are handed to a
//! callback synchronously, in source order, together with a running
//! sequence counter. Partial trailing data stays in the buffer until the
//! next read completes the frame.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ReaderError;

/// Amount the backing buffer grows by when its unused tail runs low.
pub const BUFFER_GROW_SIZE: usize = 1024;

/// Frame callback: receives the payload (delimiter excluded) and the
/// sequence number assigned to it. The slice is only valid for the
/// duration of the call; copy it to retain it.
pub type FrameFn<'a> = &'a mut (dyn FnMut(&[u8], u64) + Send);

/// Grow-on-demand reader that splits a byte stream into delimited frames.
pub struct BufferedReader {
    buffer: Vec<u8>,
    delimiter: Vec<u8>,
    max_size: usize,
    end: usize,
    scanned: usize,
    sequence: u64,
}

impl BufferedReader {
    /// Create a reader with the given initial buffer capacity.
    ///
    /// `max_size` bounds buffer growth; 0 means unbounded. The delimiter
    /// must not be empty.
    pub fn new(capacity: usize, max_size: usize, delimiter: impl Into<Vec<u8>>) -> Self {
        let delimiter = delimiter.into();
        debug_assert!(!delimiter.is_empty(), "frame delimiter must not be empty");
        Self {
            buffer: vec![0; capacity],
            delimiter,
            max_size,
            end: 0,
            scanned: 0,
            sequence: 0,
        }
    }

    /// Discard any pending partial frame and restart the sequence
    /// counter at `sequence`.
    pub fn reset(&mut self, sequence: u64) {
        self.end = 0;
        self.scanned = 0;
        self.sequence = sequence;
    }

    /// Sequence number the next extracted frame will carry.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Bytes of the pending partial frame.
    #[inline]
    pub fn pending(&self) -> usize {
        self.end
    }

    /// Perform one read from `source` into the buffer tail, then deliver
    /// every newly completed frame to `on_frame`.
    ///
    /// Returns `ReaderError::Eof` when the source reports end of input;
    /// tailing callers retry after yielding. Fails with
    /// `ReaderError::Overflow` when completing a frame would require
    /// growing the buffer past `max_size`.
    pub async fn read<R>(&mut self, source: &mut R, on_frame: FrameFn<'_>) -> Result<(), ReaderError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if self.buffer.len() - self.end < BUFFER_GROW_SIZE {
            let grown = self.buffer.len() + BUFFER_GROW_SIZE;
            if self.max_size > 0 && grown > self.max_size {
                return Err(ReaderError::Overflow {
                    limit: self.max_size,
                });
            }
            self.buffer.resize(grown, 0);
        }

        let count = source.read(&mut self.buffer[self.end..]).await?;
        if count == 0 {
            return Err(ReaderError::Eof);
        }
        self.end += count;

        self.extract(on_frame);
        Ok(())
    }

    /// Scan forward from the last scan cursor and deliver complete frames.
    fn extract(&mut self, on_frame: FrameFn<'_>) {
        let delimiter_len = self.delimiter.len();
        let mut frame_start = 0;
        let mut cursor = self.scanned;

        while cursor + delimiter_len <= self.end {
            if self.buffer[cursor..cursor + delimiter_len] == self.delimiter[..] {
                on_frame(&self.buffer[frame_start..cursor], self.sequence);
                self.sequence += 1;
                frame_start = cursor + delimiter_len;
                cursor = frame_start;
            } else {
                cursor += 1;
            }
        }

        // Keep only the partial trailing frame; the scan cursor stays just
        // short of the end so a delimiter split across reads is still found.
        if frame_start > 0 {
            self.buffer.copy_within(frame_start..self.end, 0);
            self.end -= frame_start;
        }
        self.scanned = cursor - frame_start;
    }
}

#[cfg(test)]
#[path = "reader_test.rs"]
mod reader_test;
