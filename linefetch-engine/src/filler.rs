//! Background prefetch of the backup buffer
//!
//! Fills run on one worker thread per stream, spawned on the first request
//! and fed through a capacity-1 channel. At most one fill is in flight. The
//! target buffer is lent out of the shared [`BufferPair`] for the duration of
//! the blocking read, so the lock is only held while taking the buffer and
//! handing it back.

use crate::coordinator::{BufferPair, Slot};
use crate::error::{Result, StreamError};
use crate::source::{ByteSource, SourceFill};
use linefetch_core::Buffer;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use tracing::{trace, warn};

/// Lock a mutex, recovering the guard if another thread panicked while holding it.
///
/// Buffer state is only ever changed through `Buffer` methods that keep its
/// cursor invariant, so a poisoned pair is still consistent.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fill counters shared with the background thread
#[derive(Debug, Default)]
pub(crate) struct FillCounters {
    pub(crate) fills: AtomicU64,
    pub(crate) bytes: AtomicU64,
}

impl FillCounters {
    pub(crate) fn record(&self, bytes: usize) {
        self.fills.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

/// A buffer lent to the worker together with the slot it goes back to
struct FillJob {
    slot: Slot,
    buffer: Buffer,
}

/// Channel ends of the running worker thread
struct Worker {
    jobs: SyncSender<FillJob>,
    results: Receiver<io::Result<usize>>,
}

/// Single-slot handle over the outstanding background fill
pub(crate) struct Filler<S: ByteSource + 'static> {
    source: Arc<Mutex<S>>,
    pair: Arc<Mutex<BufferPair>>,
    closed: Arc<AtomicBool>,
    counters: Arc<FillCounters>,
    worker: Option<Worker>,
    pending: bool,
    finished: Option<io::Result<usize>>,
}

impl<S: ByteSource + 'static> Filler<S> {
    pub(crate) fn new(
        source: Arc<Mutex<S>>,
        pair: Arc<Mutex<BufferPair>>,
        counters: Arc<FillCounters>,
    ) -> Self {
        Self {
            source,
            pair,
            closed: Arc::new(AtomicBool::new(false)),
            counters,
            worker: None,
            pending: false,
            finished: None,
        }
    }

    fn spawn_worker(&self) -> Result<Worker> {
        let (jobs, job_queue) = mpsc::sync_channel::<FillJob>(1);
        let (result_tx, results) = mpsc::sync_channel(1);

        let source = Arc::clone(&self.source);
        let pair = Arc::clone(&self.pair);
        let closed = Arc::clone(&self.closed);
        let counters = Arc::clone(&self.counters);

        thread::Builder::new()
            .name("linefetch-fill".to_string())
            .spawn(move || {
                // Ends once the filler drops its sender
                for FillJob { slot, mut buffer } in job_queue {
                    let result = {
                        let mut source = lock(&source);
                        buffer.fill(&mut SourceFill(&mut *source))
                    };
                    lock(&pair).restore(slot, buffer);

                    // close() could not take the source while this read held it
                    if closed.load(Ordering::SeqCst) {
                        lock(&source).close();
                    }

                    match &result {
                        Ok(n) => {
                            counters.record(*n);
                            trace!(?slot, bytes = *n, "background fill complete");
                        }
                        Err(e) => trace!(?slot, error = %e, "background fill failed"),
                    }
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            })
            .map_err(StreamError::FillerSpawn)?;

        trace!("fill worker started");
        Ok(Worker { jobs, results })
    }

    /// Start filling `slot` in the background.
    ///
    /// Returns `false` without doing anything if a fill is already running,
    /// the stream is closed, the source is exhausted, or the target still
    /// holds unread bytes.
    pub(crate) fn request_fill(&mut self, slot: Slot) -> Result<bool> {
        if self.pending || self.is_closed() || self.source_exhausted() {
            return Ok(false);
        }
        if self.worker.is_none() {
            self.worker = Some(self.spawn_worker()?);
        }

        let Some(worker) = &self.worker else {
            return Ok(false);
        };
        let Some(buffer) = lock(&self.pair).lend_if_drained(slot) else {
            return Ok(false);
        };

        if let Err(mpsc::SendError(job)) = worker.jobs.send(FillJob { slot, buffer }) {
            // The worker died with an earlier fill
            lock(&self.pair).restore(job.slot, job.buffer);
            self.worker = None;
            return Err(StreamError::FillerPanicked);
        }

        self.pending = true;
        Ok(true)
    }

    /// Block until the outstanding fill, if any, has handed its buffer back
    pub(crate) fn await_fill(&mut self) -> Result<()> {
        if !self.pending {
            return Ok(());
        }
        self.pending = false;

        let result = match self.finished.take() {
            Some(result) => result,
            None => match self.worker.as_ref().map(|worker| worker.results.recv()) {
                Some(Ok(result)) => result,
                _ => return Err(StreamError::FillerPanicked),
            },
        };
        result?;
        Ok(())
    }

    /// Whether the outstanding fill has returned, without blocking
    pub(crate) fn fill_finished(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        if self.finished.is_some() {
            return true;
        }
        let Some(worker) = &self.worker else {
            return true;
        };
        match worker.results.try_recv() {
            Ok(result) => {
                self.finished = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            // The worker is gone; await_fill reports it
            Err(TryRecvError::Disconnected) => true,
        }
    }

    /// Whether a fill is currently outstanding
    pub(crate) fn is_busy(&self) -> bool {
        self.pending
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether the source will produce no more bytes
    pub(crate) fn source_exhausted(&self) -> bool {
        self.is_closed() || lock(&self.source).is_exhausted()
    }

    /// Synchronously fill a buffer that is not shared with the pair yet
    pub(crate) fn prime(&self, buffer: &mut Buffer) -> Result<usize> {
        let n = buffer.fill(&mut SourceFill(&mut *lock(&self.source)))?;
        self.counters.record(n);
        Ok(n)
    }

    /// Close the source without waiting for a running fill.
    ///
    /// A fill that is still blocked on the source is detached; it closes the
    /// source itself once its read returns. Returns whether such a fill was
    /// left running.
    pub(crate) fn close(&mut self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let detached = self.pending && !self.fill_finished();
        if detached {
            warn!("closing stream while a background fill is in flight");
        }
        self.pending = false;
        self.finished = None;
        // Dropping the sender stops the worker after its current read
        self.worker = None;

        match self.source.try_lock() {
            Ok(mut source) => source.close(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().close(),
            Err(TryLockError::WouldBlock) => {}
        }
        detached
    }
}
