//! Configuration types for prefetching streams

use crate::error::{Result, StreamError};

/// Smallest buffer capacity a stream will use; smaller requests are clamped up
pub const MIN_BUFFER_CAPACITY: usize = 4 * 1024;

/// Largest initial buffer capacity accepted at construction
pub const MAX_BUFFER_CAPACITY: usize = 1 << 30;

/// Initial capacity used when none is given
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Stream configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct StreamConfig {
    /// Initial capacity of each of the two buffers, in bytes
    pub buffer_capacity: usize,
    /// Ceiling for buffer growth (None = grow as long as the source has data)
    pub max_capacity: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_capacity: None,
        }
    }
}

impl StreamConfig {
    /// Create a configuration with the given initial buffer capacity
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity,
            ..Default::default()
        }
    }

    /// Small buffers for interactive, line-at-a-time sources
    pub fn small() -> Self {
        Self::new(MIN_BUFFER_CAPACITY)
    }

    /// Large buffers for bulk transfers
    pub fn large() -> Self {
        Self::new(1024 * 1024) // 1MB
    }

    /// Create a builder
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }

    /// Capacity actually used for each buffer after clamping to the floor
    pub fn effective_capacity(&self) -> usize {
        self.buffer_capacity.max(MIN_BUFFER_CAPACITY)
    }

    /// Reject parameters a stream cannot be built with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(StreamError::Config(format!(
                "buffer capacity {} exceeds the limit of {} bytes",
                self.buffer_capacity, MAX_BUFFER_CAPACITY
            )));
        }
        if let Some(max) = self.max_capacity {
            if max < self.effective_capacity() {
                return Err(StreamError::Config(format!(
                    "max capacity {} is below the initial buffer capacity {}",
                    max,
                    self.effective_capacity()
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    ///
    /// ```toml
    /// buffer_capacity = 16384
    /// max_capacity = 1048576
    /// ```
    #[cfg(feature = "serde")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: StreamConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for StreamConfig
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial capacity of each buffer
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Set the growth ceiling
    pub fn max_capacity(mut self, max: Option<usize>) -> Self {
        self.config.max_capacity = max;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<StreamConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
