//! Rclone-backed remote paths.
//!
//! A remote path keeps the remote name and a `/`-rooted relative path
//! separately and joins them into an rclone target (`name:/path`) per
//! invocation. The remote's configured type is fetched once per value and
//! cached, so repeated operations on the same path do not re-run
//! `listremotes`.

use rclone::{Rclone, RcloneStream};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::DownloadConfig;
use crate::error::{FsError, Result};
use crate::fs::FileEntry;
use crate::mime::DIRECTORY_MIME;
use crate::mime::OCTET_STREAM;
use crate::policy::AllowlistPolicy;

/// A path on an rclone remote.
#[derive(Debug, Clone)]
pub struct RemotePath {
    remote: String,
    relative: String,
    rclone: Rclone,
    policy: AllowlistPolicy,
    remote_type: OnceCell<Option<String>>,
}

impl RemotePath {
    pub(crate) fn new(
        remote: impl Into<String>,
        relative: impl Into<String>,
        rclone: Rclone,
        policy: AllowlistPolicy,
    ) -> Self {
        Self {
            remote: remote.into(),
            relative: relative.into(),
            rclone,
            policy,
            remote_type: OnceCell::new(),
        }
    }

    /// The remote's configured name, without the trailing colon.
    pub fn remote_name(&self) -> &str {
        &self.remote
    }

    /// The path within the remote, always starting with `/`.
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    /// The rclone target string, `name:/path`.
    fn target(&self) -> String {
        format!("{}:{}", self.remote, self.relative)
    }

    /// The base name of this path; the remote's name at the root.
    pub fn base_name(&self) -> &str {
        let (_, name) = self.parent_and_name();
        if name.is_empty() {
            &self.remote
        } else {
            name
        }
    }

    /// A path below this one. The child shares the cached remote type, so
    /// walking many children does not re-run `listremotes`.
    pub(crate) fn child(&self, relative: &str) -> RemotePath {
        let mut child = self.clone();
        child.relative = if self.relative == "/" {
            format!("/{}", relative)
        } else {
            format!("{}/{}", self.relative, relative)
        };
        child
    }

    /// Splits the relative path into its parent directory and base name.
    fn parent_and_name(&self) -> (&str, &str) {
        match self.relative.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((parent, name)) => (parent, name),
            None => ("/", self.relative.as_str()),
        }
    }

    /// The remote's configured backend type, or `None` when no remote of
    /// this name is configured. Cached after the first lookup.
    pub async fn remote_type(&self) -> Result<Option<String>> {
        let kind = self
            .remote_type
            .get_or_try_init(|| async {
                let remotes = self.rclone.remotes().await?;
                Ok::<_, FsError>(
                    remotes
                        .into_iter()
                        .find(|r| r.name == self.remote)
                        .map(|r| r.kind),
                )
            })
            .await?;
        Ok(kind.clone())
    }

    /// Checks that the remote is configured and admitted by the policy.
    async fn validate(&self) -> Result<()> {
        let kind = self.remote_type().await?;
        self.policy.validate_remote(&self.remote, kind.as_deref())
    }

    /// Enumerates the immediate children of this directory.
    pub async fn list(&self) -> Result<Vec<FileEntry>> {
        self.validate().await?;
        let rows = self.rclone.lsjson(&self.target()).await?;
        debug!(target = %self.target(), entries = rows.len(), "listed remote directory");
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    /// Whether this path is a directory on the remote.
    ///
    /// The root of a remote is always a directory. Anything else is checked
    /// against the parent's directory listing rather than by probing the
    /// path itself, which on some backends answers for a samename child.
    pub async fn is_directory(&self) -> Result<bool> {
        self.validate().await?;
        if self.relative == "/" {
            return Ok(true);
        }
        let (parent, name) = self.parent_and_name();
        let dirs = self
            .rclone
            .lsf_dirs(&format!("{}:{}", self.remote, parent))
            .await?;
        Ok(dirs.iter().any(|d| d == name))
    }

    /// Resolves the MIME type of this path from rclone's listing metadata.
    pub async fn mime_type(&self) -> Result<String> {
        if self.is_directory().await? {
            return Ok(DIRECTORY_MIME.to_string());
        }
        let (_, name) = self.parent_and_name();
        let rows = self.rclone.lsjson(&self.target()).await?;
        let row = rows
            .into_iter()
            .find(|r| r.path == name)
            .ok_or_else(|| FsError::NotFound(self.target().into()))?;
        Ok(row.mime_type.unwrap_or_else(|| OCTET_STREAM.to_string()))
    }

    /// Reads the full contents of the file.
    pub async fn read(&self) -> Result<Vec<u8>> {
        self.validate().await?;
        Ok(self.rclone.cat_all(&self.target()).await?)
    }

    /// Opens a chunked stream over the file's contents.
    pub async fn read_stream(&self) -> Result<RcloneStream> {
        self.validate().await?;
        Ok(self.rclone.cat(&self.target())?)
    }

    /// Recursively enumerates the files under this directory for archiving.
    ///
    /// Entry paths are relative to this directory with `/` separators, as
    /// reported by rclone.
    pub async fn files_to_zip(&self) -> Result<Vec<FileEntry>> {
        self.validate().await?;
        let rows = self.rclone.lsjson_recursive(&self.target()).await?;
        Ok(rows
            .into_iter()
            .filter(|r| !r.is_dir)
            .map(entry_from_row)
            .collect())
    }

    /// Whether this directory can be downloaded as an archive, with the
    /// reason when it cannot.
    pub async fn can_download_as_zip(&self, limits: &DownloadConfig) -> (bool, Option<String>) {
        let entries = match self.files_to_zip().await {
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

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.remote, self.relative)
    }
}

fn entry_from_row(row: rclone::LsJsonEntry) -> FileEntry {
    let size = row.size_bytes();
    FileEntry {
        name: row.name,
        size,
        modified: row.mod_time,
        is_dir: row.is_dir,
        mime_type: row.mime_type,
        path: row.path,
    }
}
