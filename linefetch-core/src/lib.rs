//! Fill/drain byte buffer for the linefetch prefetching reader
//!
//! This crate holds the pure data side of the double-buffered reader: a
//! fixed-capacity byte region with a fill level and a read cursor. It performs
//! no I/O of its own and carries no synchronization; the engine crate decides
//! when a buffer is filled, drained, swapped, or grown.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod buffer;

pub use buffer::{Buffer, FillFrom};
