//! Error types for prefetching streams

use thiserror::Error;

/// Stream-level errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// The byte source failed during a fill
    #[error("source read failed: {0}")]
    SourceRead(#[from] std::io::Error),

    /// Construction parameters were rejected
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A token outgrew the configured capacity ceiling
    #[error("token exceeds the maximum buffer capacity of {limit} bytes")]
    TokenTooLong {
        /// Capacity ceiling in bytes
        limit: usize,
    },

    /// Token bytes were not valid UTF-8
    #[error("encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// The background fill thread panicked before handing its buffer back
    #[error("background fill thread panicked")]
    FillerPanicked,

    /// The background fill thread could not be started
    #[error("failed to start background fill thread: {0}")]
    FillerSpawn(#[source] std::io::Error),

    /// The stream was used after `close()`
    #[error("stream is closed")]
    Closed,
}

#[cfg(feature = "serde")]
impl From<toml::de::Error> for StreamError {
    fn from(err: toml::de::Error) -> Self {
        StreamError::Config(err.to_string())
    }
}

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;
