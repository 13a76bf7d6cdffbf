//! Typed views over rclone's machine-readable output.
//!
//! Covers the three output formats the adapter consumes: `lsjson` (JSON
//! array of entries), `lsf` (one name per line), and `listremotes --long`
//! (`name:` column followed by the backend type).

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A single entry from `rclone lsjson` output.
///
/// Field names follow rclone's JSON casing. Optional fields are absent for
/// backends that do not report them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsJsonEntry {
    /// Path relative to the listed root.
    pub path: String,
    /// Base name of the entry.
    pub name: String,
    /// Size in bytes. Rclone reports -1 when the backend cannot tell.
    #[serde(default)]
    pub size: i64,
    /// MIME type reported by the backend, when known.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Modification time in RFC 3339 format.
    #[serde(default)]
    pub mod_time: Option<DateTime<Utc>>,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl LsJsonEntry {
    /// Size in bytes, clamping rclone's unknown-size marker (-1) to zero.
    pub fn size_bytes(&self) -> u64 {
        self.size.max(0) as u64
    }
}

/// Parses the JSON array produced by `rclone lsjson`.
pub fn parse_lsjson(output: &[u8]) -> crate::Result<Vec<LsJsonEntry>> {
    Ok(serde_json::from_slice(output)?)
}

/// Parses `rclone lsf` output: one entry name per line.
pub fn parse_lsf(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A remote configured in rclone, as reported by `listremotes --long`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    /// Remote name, without the trailing colon.
    pub name: String,
    /// Backend type, for example "s3" or "alias".
    pub kind: String,
}

/// Parses `rclone listremotes --long` output.
///
/// Each line has the form `name:` padded with spaces, followed by the
/// backend type. Lines that do not fit that shape are skipped, so a remote
/// with an unreadable type simply does not appear in the result.
pub fn parse_listremotes(output: &str) -> Vec<RemoteDescriptor> {
    let mut remotes = Vec::new();
    for line in output.lines() {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let kind = rest.trim();
        if name.is_empty() || kind.is_empty() {
            continue;
        }
        remotes.push(RemoteDescriptor {
            name: name.to_string(),
            kind: kind.to_string(),
        });
    }
    remotes
}
