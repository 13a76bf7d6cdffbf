//! File service module for local and rclone-backed paths.
//!
//! This module provides the path model the CLI operates on:
//! - Parsing user input into local or remote paths
//! - Directory listing, reads, and MIME resolution on either kind
//! - Local-only mutation (write, mkdir, touch, upload)
//! - Recursive enumeration feeding the archive streamer
//!
//! # Security
//!
//! Every local operation validates against the allowlist before touching
//! the filesystem, and every remote operation checks that the remote is
//! configured and admitted by the policy before rclone runs. Remote paths
//! are read-only; mutation requests fail without invoking rclone.

pub mod local;
pub mod remote;
pub mod resolver;

pub use local::LocalPath;
pub use remote::RemotePath;
pub use resolver::PathResolver;

use std::io::Read;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DownloadConfig;
use crate::error::{FsError, Result};

/// One row of a directory listing.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    /// Base name of the entry.
    pub name: String,
    /// Path relative to the listed directory, with `/` separators.
    pub path: String,
    /// Size in bytes. Zero when the backend cannot tell.
    pub size: u64,
    /// Modification time, when the backend reports one.
    pub modified: Option<DateTime<Utc>>,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// MIME type, when the listing already carries one.
    pub mime_type: Option<String>,
}

/// A resolved path, local or on an rclone remote.
#[derive(Debug, Clone)]
pub enum FsPath {
    Local(LocalPath),
    Remote(RemotePath),
}

impl FsPath {
    pub fn is_remote(&self) -> bool {
        matches!(self, FsPath::Remote(_))
    }

    /// Whether the path is a directory.
    pub async fn is_directory(&self) -> Result<bool> {
        match self {
            FsPath::Local(local) => local.is_directory(),
            FsPath::Remote(remote) => remote.is_directory().await,
        }
    }

    /// Enumerates the immediate children of this directory.
    pub async fn list(&self) -> Result<Vec<FileEntry>> {
        match self {
            FsPath::Local(local) => local.list(),
            FsPath::Remote(remote) => remote.list().await,
        }
    }

    /// Reads the full contents of the file.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match self {
            FsPath::Local(local) => local.read(),
            FsPath::Remote(remote) => remote.read().await,
        }
    }

    /// Resolves the MIME type of this path.
    pub async fn mime_type(&self) -> Result<String> {
        match self {
            FsPath::Local(local) => local.mime_type(),
            FsPath::Remote(remote) => remote.mime_type().await,
        }
    }

    /// Recursively enumerates the files under this directory for archiving.
    pub async fn files_to_zip(&self) -> Result<Vec<FileEntry>> {
        match self {
            FsPath::Local(local) => local.files_to_zip(),
            FsPath::Remote(remote) => remote.files_to_zip().await,
        }
    }

    /// Whether this directory can be downloaded as an archive, with the
    /// reason when it cannot.
    pub async fn can_download_as_zip(&self, limits: &DownloadConfig) -> (bool, Option<String>) {
        match self {
            FsPath::Local(local) => local.can_download_as_zip(limits),
            FsPath::Remote(remote) => remote.can_download_as_zip(limits).await,
        }
    }

    /// Writes the given bytes as the file's full contents. Local only.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        match self {
            FsPath::Local(local) => local.write(bytes),
            FsPath::Remote(remote) => Err(FsError::RemoteReadOnly(remote.to_string())),
        }
    }

    /// Creates this directory. Local only.
    pub fn mkdir(&self) -> Result<()> {
        match self {
            FsPath::Local(local) => local.mkdir(),
            FsPath::Remote(remote) => Err(FsError::RemoteReadOnly(remote.to_string())),
        }
    }

    /// Creates this file if it does not exist. Local only.
    pub fn touch(&self) -> Result<()> {
        match self {
            FsPath::Local(local) => local.touch(),
            FsPath::Remote(remote) => Err(FsError::RemoteReadOnly(remote.to_string())),
        }
    }

    /// Stores an uploaded stream at this path. Local only.
    pub fn handle_upload(&self, source: &mut dyn Read) -> Result<u64> {
        match self {
            FsPath::Local(local) => local.handle_upload(source),
            FsPath::Remote(remote) => Err(FsError::RemoteReadOnly(remote.to_string())),
        }
    }

    /// The base name of this path, if it has one.
    pub fn base_name(&self) -> Option<String> {
        match self {
            FsPath::Local(local) => local
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            FsPath::Remote(remote) => Some(remote.base_name().to_string()),
        }
    }
}

impl std::fmt::Display for FsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsPath::Local(local) => local.fmt(f),
            FsPath::Remote(remote) => remote.fmt(f),
        }
    }
}
