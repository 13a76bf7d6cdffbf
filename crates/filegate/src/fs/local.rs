//! Local filesystem paths.
//!
//! Every operation validates against the allowlist before touching the
//! filesystem, and mutation validates before any byte is written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::DownloadConfig;
use crate::error::{FsError, Result};
use crate::fs::FileEntry;
use crate::mime;
use crate::policy::AllowlistPolicy;

/// A local filesystem path with allowlist-gated operations.
#[derive(Debug, Clone)]
pub struct LocalPath {
    path: PathBuf,
    policy: AllowlistPolicy,
}

impl LocalPath {
    pub(crate) fn new(path: impl Into<PathBuf>, policy: AllowlistPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// The path as resolved, before canonicalization.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path below this one, under the same policy.
    pub(crate) fn child(&self, relative: &str) -> LocalPath {
        LocalPath::new(self.path.join(relative), self.policy.clone())
    }

    fn validate(&self) -> Result<PathBuf> {
        self.policy.validate(&self.path)
    }

    fn metadata(&self, path: &Path) -> Result<fs::Metadata> {
        fs::metadata(path).map_err(|e| self.map_io_error(e))
    }

    fn map_io_error(&self, err: io::Error) -> FsError {
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(self.path.clone()),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(self.path.clone()),
            _ => FsError::Io(err),
        }
    }

    /// Whether the path exists and is a directory.
    pub fn is_directory(&self) -> Result<bool> {
        let path = self.validate()?;
        Ok(path.is_dir())
    }

    /// Enumerates the immediate children of this directory.
    ///
    /// Entries whose metadata cannot be read are skipped rather than
    /// failing the listing.
    pub fn list(&self) -> Result<Vec<FileEntry>> {
        let dir = self.validate()?;
        let metadata = self.metadata(&dir)?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(self.path.clone()));
        }

        let reader = fs::read_dir(&dir).map_err(|e| self.map_io_error(e))?;
        let mut entries = Vec::new();
        for entry in reader {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(FileEntry {
                path: name.clone(),
                name,
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                modified: system_time_to_utc(metadata.modified().ok()),
                is_dir: metadata.is_dir(),
                mime_type: None,
            });
        }
        Ok(entries)
    }

    /// Reads the full contents of the file.
    pub fn read(&self) -> Result<Vec<u8>> {
        let path = self.validate()?;
        let metadata = self.metadata(&path)?;
        if metadata.is_dir() {
            return Err(FsError::IsADirectory(self.path.clone()));
        }
        fs::read(&path).map_err(|e| self.map_io_error(e))
    }

    /// Opens the file for streaming reads.
    pub fn open(&self) -> Result<File> {
        let path = self.validate()?;
        let metadata = self.metadata(&path)?;
        if metadata.is_dir() {
            return Err(FsError::IsADirectory(self.path.clone()));
        }
        File::open(&path).map_err(|e| self.map_io_error(e))
    }

    /// Writes the given bytes as the file's full contents.
    ///
    /// Input is raw bytes; no charset transcoding happens here. The parent
    /// directory must already exist.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let path = self.validate()?;
        if path.is_dir() {
            return Err(FsError::IsADirectory(self.path.clone()));
        }
        fs::write(&path, bytes).map_err(|e| self.map_io_error(e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }

    /// Creates this directory. Succeeds if it already exists.
    pub fn mkdir(&self) -> Result<()> {
        let path = self.validate()?;
        match fs::create_dir(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(self.map_io_error(e)),
        }
    }

    /// Creates this file if it does not exist. Existing contents are left
    /// untouched.
    pub fn touch(&self) -> Result<()> {
        let path = self.validate()?;
        if path.is_dir() {
            return Err(FsError::IsADirectory(self.path.clone()));
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| self.map_io_error(e))?;
        Ok(())
    }

    /// Stores an uploaded stream at this path, creating parent directories
    /// as needed. Returns the number of bytes written.
    ///
    /// The allowlist check happens before any byte is read from the source.
    /// Bytes land in a temporary file next to the destination and are
    /// renamed into place, so a half-written upload never appears under the
    /// final name.
    pub fn handle_upload(&self, source: &mut dyn Read) -> Result<u64> {
        let path = self.validate()?;

        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(FsError::InvalidFileName(self.path.display().to_string())),
        };
        let parent = match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => return Err(FsError::InvalidFileName(self.path.display().to_string())),
        };

        fs::create_dir_all(&parent).map_err(|e| self.map_io_error(e))?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = parent.join(format!(
            "upload_{:x}_{}.tmp",
            timestamp,
            rand::random::<u32>()
        ));

        let mut temp_file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_path)
            .map_err(|e| self.map_io_error(e))?;

        let written = match io::copy(source, &mut temp_file) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(self.map_io_error(e));
            }
        };

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.map_io_error(e));
        }

        debug!(path = %path.display(), file = %file_name, bytes = written, "upload stored");
        Ok(written)
    }

    /// Resolves the MIME type of this path.
    pub fn mime_type(&self) -> Result<String> {
        let path = self.validate()?;
        self.metadata(&path)?;
        Ok(mime::mime_type_for_path(&path))
    }

    /// Recursively enumerates the files under this directory for archiving.
    ///
    /// Entry paths are relative to this directory with `/` separators.
    /// Symlinks are not followed; a link inside an allowed root may point
    /// outside it. Unreadable subtrees are skipped with a warning.
    pub fn files_to_zip(&self) -> Result<Vec<FileEntry>> {
        let root = self.validate()?;
        let metadata = self.metadata(&root)?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(self.path.clone()));
        }

        let mut entries = Vec::new();
        for item in walkdir::WalkDir::new(&root).follow_links(false) {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    // An unreadable root is a hard failure; anything deeper
                    // is skipped like any other vanishing entry.
                    if e.path() == Some(root.as_path()) {
                        return Err(match e.into_io_error() {
                            Some(io_err) => self.map_io_error(io_err),
                            None => FsError::PermissionDenied(self.path.clone()),
                        });
                    }
                    warn!(error = %e, "skipping unreadable entry during archive enumeration");
                    continue;
                }
            };
            if !item.file_type().is_file() {
                continue;
            }
            let metadata = match item.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            let relative = match item.path().strip_prefix(&root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            entries.push(FileEntry {
                name: item.file_name().to_string_lossy().into_owned(),
                path: posix_relative(relative),
                size: metadata.len(),
                modified: system_time_to_utc(metadata.modified().ok()),
                is_dir: false,
                mime_type: None,
            });
        }
        Ok(entries)
    }

    /// Whether this directory can be downloaded as an archive, with the
    /// reason when it cannot.
    pub fn can_download_as_zip(&self, limits: &DownloadConfig) -> (bool, Option<String>) {
        let entries = match self.files_to_zip() {
            Ok(entries) => entries,
            Err(e) => return (false, Some(e.to_string())),
        };
        if entries.is_empty() {
            return (false, Some("directory is empty".to_string()));
        }
        if entries.len() > limits.max_files as usize {
            return (
                false,
                Some(format!(
                    "directory holds {} files, limit is {}",
                    entries.len(),
                    limits.max_files
                )),
            );
        }
        let total: u64 = entries.iter().map(|e| e.size).sum();
        if total > limits.max_total_bytes {
            return (
                false,
                Some(format!(
                    "directory holds {} bytes, limit is {}",
                    total, limits.max_total_bytes
                )),
            );
        }
        (true, None)
    }
}

impl std::fmt::Display for LocalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn system_time_to_utc(time: Option<SystemTime>) -> Option<DateTime<Utc>> {
    time.map(DateTime::<Utc>::from)
}

/// Renders a relative path with `/` separators regardless of platform.
fn posix_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
