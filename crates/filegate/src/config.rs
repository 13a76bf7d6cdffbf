//! Configuration management for the FileGate service.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filegate/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zip::{MAX_ENTRIES, MAX_TOTAL_BYTES};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_files must be between 1 and 65535, got {0}")]
    InvalidMaxFiles(u32),

    #[error("max_total_bytes must be between 1 and 4294967295, got {0}")]
    InvalidMaxTotalBytes(u64),

    #[error("low_level_retries must be at least 1, got {0}")]
    InvalidLowLevelRetries(u32),

    #[error("rclone command not found: {0}")]
    InvalidRcloneCommand(String),

    #[error("allowlist path must be absolute: {0}")]
    RelativeAllowlistPath(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the FileGate service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Local filesystem access configuration.
    pub files: FilesConfig,

    /// Archive download limits.
    pub download: DownloadConfig,

    /// Remote tool invocation configuration.
    pub rclone: RcloneConfig,

    /// Logging configuration.
    pub log: LogConfig,
}

/// Local filesystem access configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Root directories local paths must fall under. Empty means all paths
    /// are allowed.
    pub allowlist_paths: Vec<PathBuf>,
}

/// Archive download limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum number of files a directory may contain and still be
    /// downloadable as an archive.
    pub max_files: u32,

    /// Maximum total size in bytes for an archive download (default: 2GB).
    pub max_total_bytes: u64,
}

/// Remote tool invocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RcloneConfig {
    /// Command used to invoke rclone. A bare name is resolved on PATH.
    pub command: String,

    /// Low-level retries passed to every rclone invocation.
    pub low_level_retries: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            allowlist_paths: Vec::new(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_files: MAX_ENTRIES,
            max_total_bytes: 2 * 1024 * 1024 * 1024, // 2GB
        }
    }
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            command: rclone::DEFAULT_COMMAND.to_string(),
            low_level_retries: rclone::DEFAULT_LOW_LEVEL_RETRIES,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filegate")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEGATE_RCLONE_PATH: Override the rclone command
    /// - FILEGATE_ALLOWLIST_PATHS: Override allowlist roots (colon-separated)
    /// - FILEGATE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(command) = std::env::var("FILEGATE_RCLONE_PATH") {
            if !command.is_empty() {
                tracing::info!(
                    "Overriding rclone command from environment: {}",
                    command
                );
                self.rclone.command = command;
            }
        }

        if let Ok(paths) = std::env::var("FILEGATE_ALLOWLIST_PATHS") {
            if !paths.is_empty() {
                tracing::info!(
                    "Overriding allowlist paths from environment: {}",
                    paths
                );
                self.files.allowlist_paths = std::env::split_paths(&paths).collect();
            }
        }

        if let Ok(level) = std::env::var("FILEGATE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!(
                    "Overriding log_level from environment: {}",
                    level
                );
                self.log.level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate max_files: 1..=65535 (u16 entry count in the archive format)
        if self.download.max_files < 1 || self.download.max_files > MAX_ENTRIES {
            return Err(ConfigError::InvalidMaxFiles(self.download.max_files));
        }

        // Validate max_total_bytes within the 32-bit container bound
        if self.download.max_total_bytes < 1 || self.download.max_total_bytes > MAX_TOTAL_BYTES {
            return Err(ConfigError::InvalidMaxTotalBytes(
                self.download.max_total_bytes,
            ));
        }

        // Validate low_level_retries: at least one attempt
        if self.rclone.low_level_retries < 1 {
            return Err(ConfigError::InvalidLowLevelRetries(
                self.rclone.low_level_retries,
            ));
        }

        // Validate the rclone command: an absolute path must exist, a
        // relative override must resolve on PATH, the default name is not
        // checked until first use.
        let command = Path::new(&self.rclone.command);
        if command.is_absolute() {
            if !command.exists() {
                return Err(ConfigError::InvalidRcloneCommand(
                    self.rclone.command.clone(),
                ));
            }
        } else if self.rclone.command != rclone::DEFAULT_COMMAND
            && which::which(&self.rclone.command).is_err()
        {
            return Err(ConfigError::InvalidRcloneCommand(
                self.rclone.command.clone(),
            ));
        }

        // Validate allowlist roots are absolute
        for path in &self.files.allowlist_paths {
            if !path.is_absolute() {
                return Err(ConfigError::RelativeAllowlistPath(
                    path.display().to_string(),
                ));
            }
        }

        // Validate log_level is a known value
        let level = self.log.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/filegate/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.files.allowlist_paths.is_empty());
        assert_eq!(config.download.max_files, 65535);
        assert_eq!(config.download.max_total_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.rclone.command, "rclone");
        assert_eq!(config.rclone.low_level_retries, 1);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_default_config_validates() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_config_path_contains_filegate() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("filegate"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_from_toml_empty_string_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            [rclone]
            command = "/opt/rclone/rclone"
            "#,
        )
        .unwrap();

        assert_eq!(config.rclone.command, "/opt/rclone/rclone");
        // Unspecified values keep their defaults
        assert_eq!(config.rclone.low_level_retries, 1);
        assert_eq!(config.download.max_files, 65535);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_from_toml_full() {
        let config = Config::from_toml(
            r#"
            [files]
            allowlist_paths = ["/home/alice", "/srv/shared"]

            [download]
            max_files = 1000
            max_total_bytes = 1073741824

            [rclone]
            command = "rclone-beta"
            low_level_retries = 3

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.files.allowlist_paths,
            vec![PathBuf::from("/home/alice"), PathBuf::from("/srv/shared")]
        );
        assert_eq!(config.download.max_files, 1000);
        assert_eq!(config.download.max_total_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.rclone.command, "rclone-beta");
        assert_eq!(config.rclone.low_level_retries, 3);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let result = Config::from_toml("[files\nallowlist_paths = []");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid TOML configuration"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let result = Config::from_toml(
            r#"
            [download]
            max_files = "many"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_to_toml_contains_sections() {
        let toml_str = Config::default().to_toml().unwrap();
        assert!(toml_str.contains("[files]"));
        assert!(toml_str.contains("[download]"));
        assert!(toml_str.contains("[rclone]"));
        assert!(toml_str.contains("[log]"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.files.allowlist_paths = vec![PathBuf::from("/data")];
        config.download.max_files = 42;
        config.log.level = "trace".to_string();

        let parsed = Config::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("no-such.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[log]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_load_invalid_file_mentions_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("nested").join("config.toml");

        Config::default().save(&path).unwrap();
        assert!(path.exists());

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, Config::default());
    }

    #[test]
    #[serial]
    fn test_env_override_rclone_path() {
        std::env::set_var("FILEGATE_RCLONE_PATH", "/custom/rclone");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("FILEGATE_RCLONE_PATH");

        assert_eq!(config.rclone.command, "/custom/rclone");
    }

    #[test]
    #[serial]
    fn test_env_override_allowlist_paths() {
        std::env::set_var("FILEGATE_ALLOWLIST_PATHS", "/home/alice:/srv/shared");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("FILEGATE_ALLOWLIST_PATHS");

        assert_eq!(
            config.files.allowlist_paths,
            vec![PathBuf::from("/home/alice"), PathBuf::from("/srv/shared")]
        );
    }

    #[test]
    #[serial]
    fn test_env_override_log_level() {
        std::env::set_var("FILEGATE_LOG_LEVEL", "trace");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("FILEGATE_LOG_LEVEL");

        assert_eq!(config.log.level, "trace");
    }

    #[test]
    #[serial]
    fn test_env_override_empty_value_ignored() {
        std::env::set_var("FILEGATE_RCLONE_PATH", "");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("FILEGATE_RCLONE_PATH");

        assert_eq!(config.rclone.command, "rclone");
    }

    #[test]
    #[serial]
    fn test_env_override_unset_leaves_config() {
        std::env::remove_var("FILEGATE_RCLONE_PATH");
        std::env::remove_var("FILEGATE_ALLOWLIST_PATHS");
        std::env::remove_var("FILEGATE_LOG_LEVEL");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_max_files_zero() {
        let mut config = Config::default();
        config.download.max_files = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxFiles(0)));
    }

    #[test]
    fn test_validate_max_files_over_container_limit() {
        let mut config = Config::default();
        config.download.max_files = 65536;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxFiles(65536)));
    }

    #[test]
    fn test_validate_max_total_bytes_zero() {
        let mut config = Config::default();
        config.download.max_total_bytes = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxTotalBytes(0)));
    }

    #[test]
    fn test_validate_max_total_bytes_over_container_limit() {
        let mut config = Config::default();
        config.download.max_total_bytes = u64::from(u32::MAX) + 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidMaxTotalBytes(u64::from(u32::MAX) + 1))
        );
    }

    #[test]
    fn test_validate_low_level_retries_zero() {
        let mut config = Config::default();
        config.rclone.low_level_retries = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLowLevelRetries(0))
        );
    }

    #[test]
    fn test_validate_absolute_rclone_command_must_exist() {
        let mut config = Config::default();
        config.rclone.command = "/nonexistent/bin/rclone".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidRcloneCommand(
                "/nonexistent/bin/rclone".to_string()
            ))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_existing_absolute_rclone_command() {
        let mut config = Config::default();
        config.rclone.command = "/bin/sh".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_relative_override_must_be_on_path() {
        let mut config = Config::default();
        config.rclone.command = "definitely-not-a-real-tool-2a7f".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRcloneCommand(_))
        ));
    }

    #[test]
    fn test_validate_default_command_not_required_to_exist() {
        // "rclone" itself is never checked; whether it is installed is a
        // runtime concern.
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_relative_allowlist_path() {
        let mut config = Config::default();
        config.files.allowlist_paths = vec![PathBuf::from("relative/dir")];
        assert_eq!(
            config.validate(),
            Err(ConfigError::RelativeAllowlistPath(
                "relative/dir".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_log_level_case_insensitive() {
        let mut config = Config::default();
        config.log.level = "INFO".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.log.level = "warning".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("warning".to_string()))
        );
    }
}
