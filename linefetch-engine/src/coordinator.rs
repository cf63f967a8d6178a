//! Double-buffer coordinator
//!
//! Two buffers share one lock. The active buffer is drained by the
//! foreground reader while the backup buffer is filled by the background
//! [`Filler`]. A fill targeting the backup is always awaited before the
//! backup changes role (swap) or size (enlarge).

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::filler::{lock, FillCounters, Filler};
use crate::source::ByteSource;
use linefetch_core::Buffer;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Physical position of a buffer inside the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    First,
    Second,
}

impl Slot {
    fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// The two buffers and the tag saying which one is active.
///
/// A slot is `None` while its buffer is lent to a background fill.
#[derive(Debug)]
pub(crate) struct BufferPair {
    first: Option<Buffer>,
    second: Option<Buffer>,
    active_is_first: bool,
}

impl BufferPair {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            first: Some(Buffer::new(capacity)),
            second: Some(Buffer::new(capacity)),
            active_is_first: true,
        }
    }

    pub(crate) fn active_slot(&self) -> Slot {
        if self.active_is_first {
            Slot::First
        } else {
            Slot::Second
        }
    }

    pub(crate) fn backup_slot(&self) -> Slot {
        self.active_slot().other()
    }

    fn flip(&mut self) {
        self.active_is_first = !self.active_is_first;
    }

    pub(crate) fn slot(&self, slot: Slot) -> Option<&Buffer> {
        match slot {
            Slot::First => self.first.as_ref(),
            Slot::Second => self.second.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: Slot) -> Option<&mut Buffer> {
        match slot {
            Slot::First => self.first.as_mut(),
            Slot::Second => self.second.as_mut(),
        }
    }

    fn cell(&mut self, slot: Slot) -> &mut Option<Buffer> {
        match slot {
            Slot::First => &mut self.first,
            Slot::Second => &mut self.second,
        }
    }

    /// Take the buffer out of `slot` if it holds no unread bytes
    pub(crate) fn lend_if_drained(&mut self, slot: Slot) -> Option<Buffer> {
        let cell = self.cell(slot);
        if cell.as_ref().is_some_and(Buffer::is_exhausted) {
            cell.take()
        } else {
            None
        }
    }

    /// Hand a lent buffer back
    pub(crate) fn restore(&mut self, slot: Slot, buffer: Buffer) {
        *self.cell(slot) = Some(buffer);
    }

    /// A buffer that is still lent after its fill was awaited was lost with a
    /// panicking fill thread.
    fn present_mut(&mut self, slot: Slot) -> Result<&mut Buffer> {
        self.slot_mut(slot).ok_or(StreamError::FillerPanicked)
    }

    fn active_mut(&mut self) -> Result<&mut Buffer> {
        let slot = self.active_slot();
        self.present_mut(slot)
    }

    fn backup(&self) -> Result<&Buffer> {
        self.slot(self.backup_slot()).ok_or(StreamError::FillerPanicked)
    }

    /// Mutable access to `(active, backup)` at once
    fn both_mut(&mut self) -> Result<(&mut Buffer, &mut Buffer)> {
        let active_is_first = self.active_is_first;
        match (self.first.as_mut(), self.second.as_mut()) {
            (Some(first), Some(second)) if active_is_first => Ok((first, second)),
            (Some(first), Some(second)) => Ok((second, first)),
            _ => Err(StreamError::FillerPanicked),
        }
    }
}

/// Counters describing how a stream has been serviced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Number of times the backup buffer was promoted to active
    pub swaps: u64,
    /// Number of enlarge passes that merged the backup into the active buffer
    pub enlargements: u64,
    /// Number of reads issued against the source, including the initial one
    pub fills: u64,
    /// Total bytes read from the source
    pub bytes_read: u64,
}

/// Owner of both buffers and of the single outstanding background fill
pub struct Coordinator<S: ByteSource + 'static> {
    pair: Arc<Mutex<BufferPair>>,
    filler: Filler<S>,
    counters: Arc<FillCounters>,
    capacity: usize,
    max_capacity: Option<usize>,
    swaps: u64,
    enlargements: u64,
}

impl<S: ByteSource + 'static> Coordinator<S> {
    /// Prime the first buffer from `source` and start prefetching into the second.
    ///
    /// The initial read blocks so the stream knows from the start whether the
    /// source is already exhausted.
    pub fn new(source: S, config: &StreamConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.effective_capacity();

        let counters = Arc::new(FillCounters::default());
        let pair = Arc::new(Mutex::new(BufferPair::new(capacity)));
        let filler = Filler::new(
            Arc::new(Mutex::new(source)),
            Arc::clone(&pair),
            Arc::clone(&counters),
        );

        let mut guard = lock(&pair);
        let primed = filler.prime(guard.present_mut(Slot::First)?)?;
        drop(guard);

        let mut coordinator = Self {
            pair,
            filler,
            counters,
            capacity,
            max_capacity: config.max_capacity,
            swaps: 0,
            enlargements: 0,
        };
        coordinator.filler.request_fill(Slot::Second)?;
        debug!(capacity, primed, "stream created");
        Ok(coordinator)
    }

    /// Run `f` on the active buffer under the lock
    pub(crate) fn with_active<T>(&self, f: impl FnOnce(&mut Buffer) -> T) -> Result<T> {
        let mut pair = lock(&self.pair);
        let active = pair.active_mut()?;
        Ok(f(active))
    }

    fn backup_has_data(&self) -> Result<bool> {
        Ok(!lock(&self.pair).backup()?.is_exhausted())
    }

    /// Wait for the backup's fill and report whether it holds unread bytes.
    ///
    /// If the backup is empty but the source may still produce data (no
    /// prefetch was running), the backup is filled in the foreground.
    fn settle_backup(&mut self) -> Result<bool> {
        self.filler.await_fill()?;
        if self.backup_has_data()? {
            return Ok(true);
        }
        if self.filler.source_exhausted() {
            return Ok(false);
        }
        let backup = lock(&self.pair).backup_slot();
        self.filler.request_fill(backup)?;
        self.filler.await_fill()?;
        self.backup_has_data()
    }

    /// Promote the backup buffer to active.
    ///
    /// Returns `false` when the source is exhausted and the backup has no
    /// unread bytes, i.e. nothing is left to read.
    pub fn swap(&mut self) -> Result<bool> {
        if !self.settle_backup()? {
            return Ok(false);
        }

        let new_backup = {
            let mut pair = lock(&self.pair);
            pair.active_mut()?.clear();
            pair.flip();
            pair.backup_slot()
        };
        self.swaps += 1;
        debug!(swaps = self.swaps, "swapped buffers");

        self.filler.request_fill(new_backup)?;
        Ok(true)
    }

    /// Grow both buffers and move the backup's unread bytes behind the
    /// active buffer's unread bytes.
    ///
    /// Capacity doubles until the merged data fits. The unread bytes of the
    /// active buffer keep their order and start at its cursor, so a scan
    /// offset relative to the cursor stays valid. Returns `false` when the
    /// source is exhausted.
    pub fn enlarge(&mut self) -> Result<bool> {
        let has_data = self.settle_backup()?;
        if !has_data || self.filler.source_exhausted() {
            return Ok(false);
        }

        let backup_slot = {
            let mut pair = lock(&self.pair);
            let (active, backup) = pair.both_mut()?;
            active.compact();

            let needed = active.fill_level() + backup.remaining();
            let mut new_capacity = active.capacity();
            while new_capacity < needed {
                new_capacity = new_capacity.saturating_mul(2);
            }
            if let Some(limit) = self.max_capacity {
                if needed > limit {
                    return Err(StreamError::TokenTooLong { limit });
                }
                new_capacity = new_capacity.min(limit);
            }

            active.resize(new_capacity);
            backup.resize(new_capacity);
            active.append(backup.unread());
            backup.clear();
            self.capacity = active.capacity();
            pair.backup_slot()
        };
        self.enlargements += 1;
        debug!(
            capacity = self.capacity,
            enlargements = self.enlargements,
            "enlarged buffers"
        );

        self.filler.request_fill(backup_slot)?;
        Ok(true)
    }

    /// Whether every byte the source will ever produce has been consumed.
    ///
    /// May block on the outstanding background fill.
    pub fn is_at_end(&mut self) -> Result<bool> {
        if !self.with_active(|active| active.is_exhausted())? {
            return Ok(false);
        }
        Ok(!self.settle_backup()?)
    }

    /// Current capacity of each buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the stream counters
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            swaps: self.swaps,
            enlargements: self.enlargements,
            fills: self.counters.fills.load(Ordering::Relaxed),
            bytes_read: self.counters.bytes.load(Ordering::Relaxed),
        }
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.filler.is_closed()
    }

    /// Close the source. Idempotent; an in-flight fill is left to finish on its own.
    pub fn close(&mut self) {
        if self.filler.is_closed() {
            return;
        }
        self.filler.close();
        debug!("stream closed");
    }
}

impl<S: ByteSource + 'static> Drop for Coordinator<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: ByteSource + 'static> std::fmt::Debug for Coordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("capacity", &self.capacity)
            .field("max_capacity", &self.max_capacity)
            .field("fill_in_flight", &self.filler.is_busy())
            .field("closed", &self.filler.is_closed())
            .finish()
    }
}
