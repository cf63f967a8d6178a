//! Shared helpers for integration tests

#![allow(dead_code)]

use linefetch_engine::{ByteSource, PrefetchReader, ReaderSource, Result};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

/// Mock reader that provides data in small chunks
pub struct ChunkedReader {
    data: Vec<u8>,
    position: usize,
    chunk_size: usize,
    delay: Option<Duration>,
}

impl ChunkedReader {
    pub fn new(data: &[u8], chunk_size: usize) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
            chunk_size: chunk_size.max(1),
            delay: None,
        }
    }

    /// Sleep before every read, like a slow pipe
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.position >= self.data.len() {
            return Ok(0);
        }

        let remaining = self.data.len() - self.position;
        let to_read = remaining.min(self.chunk_size).min(buf.len());

        buf[..to_read].copy_from_slice(&self.data[self.position..self.position + to_read]);
        self.position += to_read;

        Ok(to_read)
    }
}

/// Source replaying a script of reads, each either a chunk of bytes or an error
pub struct ScriptedSource {
    script: VecDeque<io::Result<Vec<u8>>>,
    exhausted: bool,
}

impl ScriptedSource {
    pub fn new(script: Vec<io::Result<Vec<u8>>>) -> Self {
        Self {
            script: script.into(),
            exhausted: false,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn read_into(&mut self, region: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(region.len());
                region[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => {
                self.exhausted = true;
                Ok(0)
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn close(&mut self) {
        self.script.clear();
        self.exhausted = true;
    }
}

pub type ChunkedStream = PrefetchReader<ReaderSource<ChunkedReader>>;

/// Reader over `data` served `chunk_size` bytes per read
pub fn chunked_stream(data: &[u8], chunk_size: usize, capacity: usize) -> ChunkedStream {
    PrefetchReader::new(ReaderSource::new(ChunkedReader::new(data, chunk_size)), capacity)
        .unwrap()
}

/// Naive whole-input splitter the stream must agree with
pub fn reference_tokens(data: &[u8], delimiter: u8, keep: bool) -> Vec<Vec<u8>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, &byte) in data.iter().enumerate() {
        if byte == delimiter {
            let end = if keep { i + 1 } else { i };
            tokens.push(data[start..end].to_vec());
            start = i + 1;
        }
    }
    if start < data.len() {
        tokens.push(data[start..].to_vec());
    }
    tokens
}

/// Drain a stream through its token iterator
pub fn collect_tokens<S: ByteSource + 'static>(
    reader: &mut PrefetchReader<S>,
    delimiter: u8,
    keep: bool,
) -> Result<Vec<Vec<u8>>> {
    reader.tokens(delimiter, keep).collect()
}
