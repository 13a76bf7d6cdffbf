//! Error types for file service operations.

use std::path::PathBuf;

use thiserror::Error;

/// Error type covering local, remote, and archive operations.
#[derive(Debug, Error)]
pub enum FsError {
    // Policy errors
    /// The requested path is outside allowed boundaries.
    #[error("path is outside allowed boundaries: {0}")]
    Forbidden(PathBuf),

    // Local filesystem errors
    /// The requested path does not exist.
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    /// The requested path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The requested path is a directory, not a file.
    #[error("path is a directory: {0}")]
    IsADirectory(PathBuf),

    /// Permission denied by the operating system.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file name is empty or contains path separators.
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    // Remote errors
    /// The named remote does not exist in the rclone configuration.
    #[error("remote is not configured: {0}")]
    RemoteNotConfigured(String),

    /// Writing to a remote is not implemented.
    #[error("remote paths are read-only: {0}")]
    RemoteReadOnly(String),

    /// The underlying rclone invocation failed.
    #[error(transparent)]
    RemoteTool(#[from] rclone::RcloneError),

    // Archive errors
    /// Writing archive bytes to the destination failed.
    #[error("archive aborted: {0}")]
    ArchiveAborted(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for file service operations.
pub type Result<T> = std::result::Result<T, FsError>;
