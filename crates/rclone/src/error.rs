//! Error types for the rclone crate.

use thiserror::Error;

/// Rclone error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum RcloneError {
    // Invocation errors
    /// The rclone executable could not be found.
    #[error("rclone is not installed or not present on PATH")]
    NotInstalled,

    /// The process exited with a non-zero status.
    #[error("rclone exited with status {code}: {stderr}")]
    CommandFailed {
        /// Exit code, or -1 when the process was killed by a signal.
        code: i32,
        /// Captured standard error output.
        stderr: String,
    },

    /// The process exited successfully but wrote to standard error.
    #[error("rclone reported errors: {0}")]
    StderrOutput(String),

    // Output errors
    /// Output could not be parsed into the expected shape.
    #[error("unparseable rclone output: {0}")]
    Parse(String),

    /// I/O failure while talking to the rclone process.
    #[error("rclone i/o error: {0}")]
    Io(String),
}

/// Result type alias for rclone operations.
pub type Result<T> = std::result::Result<T, RcloneError>;

// Conversions from underlying crate errors

impl From<serde_json::Error> for RcloneError {
    fn from(err: serde_json::Error) -> Self {
        RcloneError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for RcloneError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            // Within this crate the only path that can produce NotFound is
            // spawning the executable itself.
            ErrorKind::NotFound => RcloneError::NotInstalled,
            _ => RcloneError::Io(err.to_string()),
        }
    }
}
