//! # FileGate Library
//!
//! This crate provides the file gateway behind the `filegate` CLI: one
//! path model covering local directories and rclone remotes, with
//! allowlist enforcement, MIME resolution, and streamed zip downloads.
//!
//! ## Overview
//!
//! FileGate exposes local filesystem trees and rclone-configured remotes
//! through a single address space. It provides:
//!
//! - **Path Resolution**: One string grammar for local paths and `remote:` paths
//! - **Directory Listing**: Uniform entries with size, mtime, and type
//! - **Allowlist Policy**: Local roots and remote kinds gated before any I/O
//! - **File Access**: Whole-file reads, chunked streaming, MIME detection
//! - **Local Mutation**: Writes, uploads, mkdir and touch under the allowlist
//! - **Zip Downloads**: Whole directories streamed as forward-only zip32
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        filegate CLI                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                     Path Resolver                        │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │  Local Path  │  │ Remote Path  │  │   Allowlist Policy   │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘  │
//! │                                                                  │
//! │  ┌───────────────────┐  ┌───────────────────────────────────┐  │
//! │  │   Zip Streamer    │  │        rclone Adapter             │  │
//! │  └───────────────────┘  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filegate::{Config, PathResolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration from the default path
//!     let config = Config::load_default()?;
//!     let resolver = PathResolver::from_config(&config);
//!
//!     // Local and remote paths resolve through the same grammar
//!     let path = resolver.resolve("s3backup:/docs");
//!     for entry in path.list().await? {
//!         println!("{}", entry.name);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`error`]: Error type shared by all file operations
//! - [`fs`]: Path resolution, local and remote operations
//! - [`mime`]: MIME type detection and preview safety
//! - [`policy`]: Allowlist enforcement for local roots and remote kinds
//! - [`zip`]: Forward-only zip32 writing and streaming

pub mod config;
pub mod error;
pub mod fs;
pub mod mime;
pub mod policy;
pub mod zip;

// Re-export the rclone adapter for convenience
pub use rclone;

// Re-export config types for convenience
pub use config::Config;

// Re-export error types for convenience
pub use error::{FsError, Result};

// Re-export fs types for convenience
pub use fs::{FileEntry, FsPath, LocalPath, PathResolver, RemotePath};

// Re-export policy types for convenience
pub use policy::AllowlistPolicy;

// Re-export zip types for convenience
pub use zip::{ZipJob, ZipStreamer, ZipSummary};
