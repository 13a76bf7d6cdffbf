//! Zip archive creation for directory downloads.
//!
//! This module turns an enumerated directory into a zip archive streamed
//! to any [`std::io::Write`] sink:
//! - A forward-only zip32 container writer (no seeking, data descriptors)
//! - A streamer that copies local or remote file bytes entry by entry
//! - Skip semantics for sources that fail, abort semantics for the sink
//!
//! # Limits
//!
//! zip32 caps archives at [`MAX_ENTRIES`] members and [`MAX_TOTAL_BYTES`]
//! addressable bytes. The writer enforces both; directory ceilings in the
//! configuration keep well under them.

pub mod stream;
pub mod writer;

pub use stream::{ZipJob, ZipStreamer, ZipSummary};
pub use writer::{ZipWriter, MAX_ENTRIES, MAX_TOTAL_BYTES};
