//! Byte source abstraction
//!
//! The stream only ever asks a source to fill a region, whether it is
//! exhausted, and to close. Process spawning, pipe setup and decoding all
//! happen on the caller's side of this boundary.

use linefetch_core::FillFrom;
use std::io::{self, Read};

/// Blocking byte producer feeding a stream
pub trait ByteSource: Send {
    /// Read into `region`, blocking until at least one byte is available.
    ///
    /// Returns `Ok(0)` once the source has reached end of input.
    fn read_into(&mut self, region: &mut [u8]) -> io::Result<usize>;

    /// Whether the source will never produce another byte
    fn is_exhausted(&self) -> bool;

    /// Release the underlying transport. Calling this more than once is harmless.
    fn close(&mut self);
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_into(&mut self, region: &mut [u8]) -> io::Result<usize> {
        (**self).read_into(region)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Adapts any [`Read`] implementation (child stdout, file, socket) into a [`ByteSource`]
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: Option<R>,
    exhausted: bool,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        Self {
            inner: Some(reader),
            exhausted: false,
        }
    }

    /// Whether `close()` has released the reader
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn read_into(&mut self, region: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.inner.as_mut() else {
            return Ok(0);
        };
        if region.is_empty() || self.exhausted {
            return Ok(0);
        }
        let n = reader.read(region)?;
        if n == 0 {
            self.exhausted = true;
        }
        Ok(n)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted || self.inner.is_none()
    }

    fn close(&mut self) {
        // Dropping the reader releases its descriptor
        self.inner = None;
        self.exhausted = true;
    }
}

/// Drives a [`ByteSource`] as a buffer producer, retrying interrupted reads
pub(crate) struct SourceFill<'a, S: ?Sized>(pub(crate) &'a mut S);

impl<S: ByteSource + ?Sized> FillFrom for SourceFill<'_, S> {
    type Error = io::Error;

    fn fill_region(&mut self, region: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.0.read_into(region) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linefetch_core::Buffer;
    use std::io::Cursor;

    /// Reader that fails with `Interrupted` before every successful read
    struct Flaky {
        inner: Cursor<Vec<u8>>,
        interrupt_next: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if std::mem::replace(&mut self.interrupt_next, false) {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            self.interrupt_next = true;
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_reader_source_reports_exhaustion() {
        let mut source = ReaderSource::new(Cursor::new(b"abc".to_vec()));
        let mut region = [0u8; 8];

        assert!(!source.is_exhausted());
        assert_eq!(source.read_into(&mut region).unwrap(), 3);
        assert!(!source.is_exhausted());
        assert_eq!(source.read_into(&mut region).unwrap(), 0);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_empty_region_does_not_mark_exhaustion() {
        let mut source = ReaderSource::new(Cursor::new(b"abc".to_vec()));
        assert_eq!(source.read_into(&mut []).unwrap(), 0);
        assert!(!source.is_exhausted());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut source = ReaderSource::new(Cursor::new(b"abc".to_vec()));
        source.close();
        source.close();

        assert!(source.is_closed());
        assert!(source.is_exhausted());
        let mut region = [0u8; 4];
        assert_eq!(source.read_into(&mut region).unwrap(), 0);
    }

    #[test]
    fn test_source_fill_retries_interrupted() {
        let mut source = ReaderSource::new(Flaky {
            inner: Cursor::new(b"hello".to_vec()),
            interrupt_next: true,
        });
        let mut buffer = Buffer::new(16);

        let n = buffer.fill(&mut SourceFill(&mut source)).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buffer.unread(), b"hello");

        assert_eq!(buffer.fill(&mut SourceFill(&mut source)).unwrap(), 0);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut source: Box<dyn ByteSource> =
            Box::new(ReaderSource::new(Cursor::new(b"x".to_vec())));
        let mut region = [0u8; 2];
        assert_eq!(source.read_into(&mut region).unwrap(), 1);
        source.close();
        assert!(source.is_exhausted());
    }
}
