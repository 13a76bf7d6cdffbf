//! # FileGate Rclone Adapter
//!
//! This crate wraps the `rclone` command line tool behind a typed,
//! asynchronous interface for the FileGate file service.
//!
//! ## Overview
//!
//! Remote storage access in FileGate is delegated entirely to rclone; this
//! crate is the only place that spawns it. It provides:
//!
//! - **Invocation**: one handle, [`Rclone`], that pins the binary and the
//!   flags shared by every command
//! - **Whole-output commands**: `lsjson`, `lsf`, `listremotes`, parsed into
//!   typed rows
//! - **Streaming transfers**: [`RcloneStream`] pulls file contents in fixed
//!   32 KiB chunks while standard error is drained concurrently
//! - **Strict failure detection**: a streaming transfer only counts as
//!   complete when the process exits zero with an empty standard error
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Typed helpers                │  lsjson / lsf / listremotes
//! ├─────────────────────────────────────────┤
//! │         Invocation (Rclone)             │  shared flags, spawn
//! ├─────────────────────────────────────────┤
//! │   Streaming (RcloneStream)              │  stdout chunks, stderr drain
//! ├─────────────────────────────────────────┤
//! │        rclone subprocess                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rclone::Rclone;
//!
//! #[tokio::main]
//! async fn main() -> rclone::Result<()> {
//!     let rclone = Rclone::new();
//!
//!     // List a remote directory
//!     for entry in rclone.lsjson("s3backup:/docs").await? {
//!         println!("{} ({} bytes)", entry.name, entry.size_bytes());
//!     }
//!
//!     // Stream a file without buffering it whole
//!     let mut stream = rclone.cat("s3backup:/docs/report.pdf")?;
//!     while let Some(chunk) = stream.next_chunk().await? {
//!         // forward the chunk somewhere
//!         let _ = chunk;
//!     }
//!     stream.finish().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`adapter`]: Process invocation and streaming
//! - [`types`]: Typed rows for rclone's machine-readable output
//! - [`error`]: Error types

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::{
    Rclone, RcloneStream, DEFAULT_COMMAND, DEFAULT_LOW_LEVEL_RETRIES, STREAM_CHUNK_SIZE,
};
pub use error::{RcloneError, Result};
pub use types::{parse_lsf, parse_lsjson, parse_listremotes, LsJsonEntry, RemoteDescriptor};
