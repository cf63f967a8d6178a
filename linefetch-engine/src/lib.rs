//! Prefetching delimiter reader for slow byte sources
//!
//! A [`PrefetchReader`] keeps two buffers: the active one is drained by the
//! caller while the backup one is filled from the [`ByteSource`] on a
//! background thread. When the active buffer runs dry the two swap roles;
//! when a single token spans more than a buffer pair both buffers grow.

#![warn(missing_docs)]

pub mod config;
pub mod coordinator;
pub mod error;
mod filler;
pub mod reader;
pub mod source;

// Re-export key types
pub use config::{
    StreamConfig, StreamConfigBuilder, DEFAULT_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY,
    MIN_BUFFER_CAPACITY,
};
pub use coordinator::{Coordinator, StreamStats};
pub use error::{Result, StreamError};
pub use reader::{PrefetchReader, Tokens};
pub use source::{ByteSource, ReaderSource};

// Re-export from core for convenience
pub use linefetch_core::Buffer;
