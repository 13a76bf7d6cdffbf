//! Path string resolution.
//!
//! User input arrives as a single string that either names a local path or
//! carries an rclone-style `<remote>:` prefix. Resolution never fails: a
//! string that does not match the remote grammar exactly is treated as a
//! local path, so a malformed remote reference cannot slip past the local
//! allowlist by accident.

use std::sync::LazyLock;

use regex::Regex;

use rclone::Rclone;

use crate::config::Config;
use crate::fs::{FsPath, LocalPath, RemotePath};
use crate::policy::AllowlistPolicy;

/// Remote names as rclone accepts them: letters, digits, underscore, dot,
/// hyphen, and space, followed by a colon. A path separator before the
/// colon disqualifies the prefix.
static REMOTE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Za-z_.\- ]+):").unwrap());

/// Turns raw path strings into [`FsPath`] values wired with the policy and
/// rclone handle they will operate under.
#[derive(Debug, Clone)]
pub struct PathResolver {
    policy: AllowlistPolicy,
    rclone: Rclone,
}

impl PathResolver {
    pub fn new(policy: AllowlistPolicy, rclone: Rclone) -> Self {
        Self { policy, rclone }
    }

    /// Builds a resolver from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AllowlistPolicy::new(config.files.allowlist_paths.clone()),
            Rclone::with_command(&config.rclone.command)
                .low_level_retries(config.rclone.low_level_retries),
        )
    }

    /// Resolves a raw path string. Never fails.
    pub fn resolve(&self, raw: &str) -> FsPath {
        match split_remote_prefix(raw) {
            Some((name, rest)) => FsPath::Remote(RemotePath::new(
                name,
                normalize(rest),
                self.rclone.clone(),
                self.policy.clone(),
            )),
            None => FsPath::Local(LocalPath::new(normalize(raw), self.policy.clone())),
        }
    }
}

/// Splits `name:rest` when the name fits the remote grammar.
fn split_remote_prefix(raw: &str) -> Option<(&str, &str)> {
    let captures = REMOTE_PREFIX.captures(raw)?;
    let whole = captures.get(0)?;
    let name = captures.get(1)?.as_str();
    Some((name, &raw[whole.end()..]))
}

/// Normalizes a path string to an absolute form: exactly one leading `/`,
/// no trailing `/` except for the root itself, and `.`/`..` segments
/// resolved lexically, clamping at the root.
fn normalize(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
