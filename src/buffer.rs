//! Growable FIFO byte queue for serialized frames awaiting transmission.
//!
//! Frames are appended whole by the encode path, so the queued bytes are
//! always a sequence of complete well-formed frames. Draining is a plain
//! byte copy from the front and pays no attention to frame boundaries;
//! a caller may receive half a frame on one call and the rest on the next.

use bytes::{Buf, BufMut, BytesMut};

/// Default initial capacity of the output queue.
const INITIAL_CAPACITY: usize = 4096;

/// FIFO byte queue backed by [`BytesMut`]. Growth is geometric and
/// copy-and-extend: queued bytes are never disturbed by an append.
pub struct OutputBuffer {
    buf: BytesMut,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Number of bytes queued and not yet drained.
    pub fn queued(&self) -> usize {
        self.buf.len()
    }

    /// Current allocated capacity.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Ensures room for `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// Appends `data` after the currently queued bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Appends via the [`BufMut`] interface (used by the header writer).
    pub fn writer(&mut self) -> &mut impl BufMut {
        &mut self.buf
    }

    /// Appends `len` bytes produced by `fill`, which writes into a
    /// zeroed region of exactly `len` bytes. Used by the encode slow
    /// path to serialize a large body directly into the queue.
    pub fn extend_with(&mut self, len: usize, fill: impl FnOnce(&mut [u8])) {
        let start = self.buf.len();
        self.buf.resize(start + len, 0);
        fill(&mut self.buf[start..]);
    }

    /// Copies up to `dst.len()` of the oldest queued bytes into `dst` and
    /// removes them from the queue. Returns bytes copied.
    pub fn drain(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.buf.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        self.buf.advance(n);
        n
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}
