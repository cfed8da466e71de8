//! Configuration loading and management
//!
//! Configuration is loaded from `<config dir>/rolloutscope/config.toml`
//! (`~/.config/rolloutscope/config.toml` on Linux). Every section is optional;
//! a missing file yields the defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Decoded size above which an attachment is never previewed (2 MiB).
pub const DEFAULT_MAX_PREVIEW_BYTES: u64 = 2 * 1024 * 1024;

/// Character cap for decoded text/markdown/code previews.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 20_000;

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Attachment preview limits used by the chunk builder
    #[serde(default)]
    pub attachments: AttachmentLimits,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Size and length gates for user attachment previews.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLimits {
    /// Estimated decoded size (bytes) above which preview is disabled
    #[serde(default = "default_max_preview_bytes")]
    pub max_preview_bytes: u64,

    /// Maximum characters kept from a decoded text preview
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_preview_bytes: default_max_preview_bytes(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

fn default_max_preview_bytes() -> u64 {
    DEFAULT_MAX_PREVIEW_BYTES
}

fn default_max_text_chars() -> usize {
    DEFAULT_MAX_TEXT_CHARS
}

impl AttachmentLimits {
    /// Validate limits, returning an error message if unusable
    pub fn validate(&self) -> Result<()> {
        if self.max_preview_bytes == 0 {
            return Err(Error::Config(
                "attachments.max_preview_bytes must be greater than 0".to_string(),
            ));
        }
        if self.max_text_chars == 0 {
            return Err(Error::Config(
                "attachments.max_text_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let Some(config_path) = Self::config_path() else {
            tracing::info!("No config directory available, using defaults");
            return Ok(Config::default());
        };

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.attachments.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `<config dir>/rolloutscope/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rolloutscope").join("config.toml"))
    }

    /// Returns the state directory path (for logs)
    ///
    /// Falls back to the data-local directory on platforms without a state dir.
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rolloutscope")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("rolloutscope.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.attachments.max_preview_bytes, 2 * 1024 * 1024);
        assert_eq!(config.attachments.max_text_chars, 20_000);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[logging]
level = "debug"

[attachments]
max_text_chars = 500
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 5);
        assert_eq!(config.attachments.max_text_chars, 500);
        assert_eq!(
            config.attachments.max_preview_bytes,
            DEFAULT_MAX_PREVIEW_BYTES
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_from_rejects_zero_limits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[attachments]\nmax_text_chars = 0").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_log_path() {
        assert!(Config::log_path().ends_with("rolloutscope.log"));
    }
}
