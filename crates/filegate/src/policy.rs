//! Allowlist enforcement for local paths and remote names.
//!
//! An empty allowlist means unrestricted access. With roots configured, a
//! local path is only usable when its normalized form sits at or under one
//! of them, and remotes whose backend can reach arbitrary local paths
//! ("local" and "alias") are refused outright.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{FsError, Result};

/// Remote backend types that resolve to local filesystem paths.
const LOCAL_BACKED_TYPES: &[&str] = &["local", "alias"];

/// Validates paths against a configured set of permitted root directories.
#[derive(Debug, Clone)]
pub struct AllowlistPolicy {
    roots: Vec<PathBuf>,
}

impl AllowlistPolicy {
    /// Creates a policy from the configured roots.
    ///
    /// Roots that exist are canonicalized so the later prefix comparison is
    /// symlink-stable; roots that do not exist yet are kept as configured.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let roots = roots
            .into_iter()
            .map(|root| root.canonicalize().unwrap_or(root))
            .collect();
        Self { roots }
    }

    /// True when no roots are configured and every local path is permitted.
    pub fn is_unrestricted(&self) -> bool {
        self.roots.is_empty()
    }

    /// The configured roots after canonicalization.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Checks a local path against the allowlist.
    ///
    /// Returns the normalized form of the path on success so callers operate
    /// on the same path that was checked. Paths that do not exist yet are
    /// normalized through their nearest existing ancestor, which covers
    /// mkdir/upload destinations.
    pub fn validate(&self, path: &Path) -> Result<PathBuf> {
        let normalized = normalize(path);
        if self.roots.is_empty() {
            return Ok(normalized);
        }
        for root in &self.roots {
            if normalized.starts_with(root) {
                return Ok(normalized);
            }
        }
        warn!(path = %path.display(), "path rejected by allowlist");
        Err(FsError::Forbidden(path.to_path_buf()))
    }

    /// Checks whether a remote may be used under this policy.
    ///
    /// A remote with no resolved type is not configured at all. Remotes of a
    /// local-backed type resolve to arbitrary filesystem paths and would
    /// bypass the roots, so they are rejected whenever roots are configured.
    pub fn validate_remote(&self, name: &str, remote_type: Option<&str>) -> Result<()> {
        let Some(kind) = remote_type else {
            return Err(FsError::RemoteNotConfigured(name.to_string()));
        };
        if !self.roots.is_empty() && LOCAL_BACKED_TYPES.contains(&kind) {
            warn!(remote = %name, kind = %kind, "local-backed remote rejected by allowlist");
            return Err(FsError::Forbidden(PathBuf::from(format!("{}:", name))));
        }
        Ok(())
    }
}

/// Normalizes a path for the prefix comparison.
///
/// Existing paths canonicalize directly. For a path that does not exist,
/// the nearest existing ancestor is canonicalized and the remaining
/// components are re-appended, so symlinks are resolved up to the point
/// where the path leaves the existing tree.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let mut ancestor = path;
    let mut tail = Vec::new();
    while let Some(parent) = ancestor.parent() {
        if let Some(name) = ancestor.file_name() {
            tail.push(name.to_os_string());
        }
        if let Ok(canonical) = parent.canonicalize() {
            let mut normalized = canonical;
            for component in tail.iter().rev() {
                normalized.push(component);
            }
            return normalized;
        }
        ancestor = parent;
    }
    path.to_path_buf()
}
