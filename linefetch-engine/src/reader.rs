//! Delimiter reader over a prefetching double buffer
//!
//! Tokens are extracted by scanning the active buffer. A token that runs off
//! the end of the active buffer is carried as a pending fragment across one
//! swap; if it also runs off the end of the swapped-in buffer, both buffers
//! are enlarged so the rest of the token lands in a single region.

use crate::config::StreamConfig;
use crate::coordinator::{Coordinator, StreamStats};
use crate::error::{Result, StreamError};
use crate::source::ByteSource;
use memchr::memchr;
use std::iter::FusedIterator;

/// Outcome of scanning the active buffer once
enum Scan {
    /// Delimiter found; the token bytes taken from the active buffer
    Found(Vec<u8>),
    /// No delimiter in the unread bytes; their count
    Missing(usize),
}

/// Line/delimiter reader that prefetches from a slow [`ByteSource`]
/// in the background while the caller consumes already-buffered data.
///
/// ```no_run
/// use linefetch_engine::{PrefetchReader, ReaderSource};
/// use std::process::{Command, Stdio};
///
/// let mut child = Command::new("ls").stdout(Stdio::piped()).spawn()?;
/// let stdout = child.stdout.take().expect("piped stdout");
/// let mut reader = PrefetchReader::new(ReaderSource::new(stdout), 64 * 1024)?;
///
/// while !reader.is_at_end()? {
///     let line = reader.read_line(false)?;
///     println!("{}", String::from_utf8_lossy(&line));
/// }
/// reader.close();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PrefetchReader<S: ByteSource + 'static> {
    coordinator: Coordinator<S>,
}

impl<S: ByteSource + 'static> PrefetchReader<S> {
    /// Create a reader whose buffers start at `buffer_capacity` bytes.
    ///
    /// Capacities below [`MIN_BUFFER_CAPACITY`](crate::MIN_BUFFER_CAPACITY)
    /// are clamped up; capacities above
    /// [`MAX_BUFFER_CAPACITY`](crate::MAX_BUFFER_CAPACITY) are rejected.
    /// Blocks for the first read from `source`.
    pub fn new(source: S, buffer_capacity: usize) -> Result<Self> {
        Self::with_config(source, &StreamConfig::new(buffer_capacity))
    }

    /// Create a reader from a full configuration
    pub fn with_config(source: S, config: &StreamConfig) -> Result<Self> {
        Ok(Self {
            coordinator: Coordinator::new(source, config)?,
        })
    }

    /// Read up to and including the next `delimiter` byte.
    ///
    /// With `keep` the delimiter is included in the returned token. When the
    /// source ends before a delimiter is seen the remaining bytes are returned
    /// as they are. Once the stream is at its end every call returns an empty
    /// token; use [`is_at_end`](Self::is_at_end) to tell that apart from an
    /// empty token between two delimiters.
    pub fn read_until(&mut self, delimiter: u8, keep: bool) -> Result<Vec<u8>> {
        if self.coordinator.is_closed() {
            return Err(StreamError::Closed);
        }

        let mut pending: Option<Vec<u8>> = None;
        // Unread bytes of the active buffer already known not to hold the delimiter
        let mut scanned = 0;

        loop {
            let scan = self.coordinator.with_active(|active| {
                let unread = active.unread();
                match memchr(delimiter, &unread[scanned..]) {
                    Some(offset) => {
                        let at = scanned + offset;
                        let end = if keep { at + 1 } else { at };
                        let token = unread[..end].to_vec();
                        active.consume(at + 1);
                        Scan::Found(token)
                    }
                    None => Scan::Missing(unread.len()),
                }
            })?;

            let unread_len = match scan {
                Scan::Found(token) => {
                    return Ok(match pending {
                        Some(mut fragment) => {
                            fragment.extend_from_slice(&token);
                            fragment
                        }
                        None => token,
                    });
                }
                Scan::Missing(len) => len,
            };

            if pending.is_some() && self.coordinator.enlarge()? {
                // Same data, same cursor: carry on after the bytes already scanned
                scanned = unread_len;
                continue;
            }

            let tail = self.coordinator.with_active(|active| {
                let bytes = active.unread().to_vec();
                active.consume_all();
                bytes
            })?;
            match pending.as_mut() {
                Some(fragment) => fragment.extend_from_slice(&tail),
                None => pending = Some(tail),
            }
            scanned = 0;

            if !self.coordinator.swap()? {
                return Ok(pending.unwrap_or_default());
            }
        }
    }

    /// Read the next `\n`-terminated line
    pub fn read_line(&mut self, keep: bool) -> Result<Vec<u8>> {
        self.read_until(b'\n', keep)
    }

    /// Read the next line and validate it as UTF-8
    pub fn read_line_string(&mut self, keep: bool) -> Result<String> {
        Ok(String::from_utf8(self.read_line(keep)?)?)
    }

    /// Whether every byte of the source has been consumed.
    ///
    /// May block until the outstanding background fill completes.
    pub fn is_at_end(&mut self) -> Result<bool> {
        if self.coordinator.is_closed() {
            return Ok(true);
        }
        self.coordinator.is_at_end()
    }

    /// Iterate over `\n`-terminated lines until the end of the source
    pub fn lines(&mut self, keep: bool) -> Tokens<'_, S> {
        self.tokens(b'\n', keep)
    }

    /// Iterate over `delimiter`-terminated tokens until the end of the source
    pub fn tokens(&mut self, delimiter: u8, keep: bool) -> Tokens<'_, S> {
        Tokens {
            reader: self,
            delimiter,
            keep,
            done: false,
        }
    }

    /// Current capacity of each of the two buffers
    pub fn capacity(&self) -> usize {
        self.coordinator.capacity()
    }

    /// Swap, growth and fill counters
    pub fn stats(&self) -> StreamStats {
        self.coordinator.stats()
    }

    /// Close the underlying source.
    ///
    /// Idempotent and infallible. A background fill still blocked on the
    /// source is not interrupted; it finishes on its own and releases the
    /// source when its read returns.
    pub fn close(&mut self) {
        self.coordinator.close();
    }
}

/// Iterator over the tokens of a [`PrefetchReader`]
///
/// Yields each token until the source is exhausted. After an error the
/// iterator is finished.
#[derive(Debug)]
pub struct Tokens<'a, S: ByteSource + 'static> {
    reader: &'a mut PrefetchReader<S>,
    delimiter: u8,
    keep: bool,
    done: bool,
}

impl<S: ByteSource + 'static> Iterator for Tokens<'_, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.reader.is_at_end() {
            Ok(true) => {
                self.done = true;
                return None;
            }
            Ok(false) => self.reader.read_until(self.delimiter, self.keep),
            Err(e) => Err(e),
        };
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

impl<S: ByteSource + 'static> FusedIterator for Tokens<'_, S> {}
