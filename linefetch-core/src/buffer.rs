//! Fixed-capacity byte region with a fill level and a read cursor

use alloc::vec;
use alloc::vec::Vec;

/// A producer that can write bytes into a caller-provided region.
///
/// Returning `Ok(0)` for a non-empty region means the producer has reached
/// end of input.
pub trait FillFrom {
    /// Error reported by the producer
    type Error;

    /// Write up to `region.len()` bytes into `region`, returning the count written
    fn fill_region(&mut self, region: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte region drained from the front and refilled from offset 0.
///
/// Bytes `[0, read_cursor)` are consumed, `[read_cursor, fill_level)` are
/// unread valid data and `[fill_level, capacity)` hold no meaningful data.
/// `read_cursor <= fill_level <= capacity` holds after every operation.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    read_cursor: usize,
    fill_level: usize,
}

impl Buffer {
    /// Create an empty buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            read_cursor: 0,
            fill_level: 0,
        }
    }

    /// Overwrite the buffer with one blocking read from `source`.
    ///
    /// Sets `fill_level` to the byte count and rewinds the cursor. A single
    /// read is issued so a slow producer hands over whatever it has instead
    /// of stalling until the whole region is full. On error the buffer is
    /// left empty.
    pub fn fill<S: FillFrom + ?Sized>(&mut self, source: &mut S) -> Result<usize, S::Error> {
        self.clear();
        let n = source.fill_region(&mut self.data)?;
        self.fill_level = n.min(self.data.len());
        Ok(self.fill_level)
    }

    /// Total size of the region in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes in the region
    pub fn fill_level(&self) -> usize {
        self.fill_level
    }

    /// Offset of the next unread byte
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Number of unread valid bytes
    pub fn remaining(&self) -> usize {
        self.fill_level - self.read_cursor
    }

    /// Space left after the valid data
    pub fn free(&self) -> usize {
        self.data.len() - self.fill_level
    }

    /// Whether every valid byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.read_cursor >= self.fill_level
    }

    /// Unread valid bytes
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read_cursor..self.fill_level]
    }

    /// Advance the read cursor by up to `n` bytes, returning how far it moved
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.read_cursor += n;
        n
    }

    /// Mark every valid byte as consumed
    pub fn consume_all(&mut self) {
        self.read_cursor = self.fill_level;
    }

    /// Drop all data, leaving an empty buffer of the same capacity
    pub fn clear(&mut self) {
        self.read_cursor = 0;
        self.fill_level = 0;
    }

    /// Move the unread bytes to offset 0
    pub fn compact(&mut self) {
        if self.read_cursor == 0 {
            return;
        }
        self.data.copy_within(self.read_cursor..self.fill_level, 0);
        self.fill_level -= self.read_cursor;
        self.read_cursor = 0;
    }

    /// Copy as much of `bytes` as fits into the free tail, returning the count copied
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        self.data[self.fill_level..self.fill_level + n].copy_from_slice(&bytes[..n]);
        self.fill_level += n;
        n
    }

    /// Grow the region to `new_capacity`, keeping `[0, fill_level)` in place.
    ///
    /// Requests smaller than the current capacity are ignored; a buffer never
    /// shrinks.
    pub fn resize(&mut self, new_capacity: usize) {
        if new_capacity > self.data.len() {
            self.data.resize(new_capacity, 0);
        }
    }
}
