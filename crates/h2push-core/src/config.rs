//! Configuration for push coordinators.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $H2PUSH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/h2push/config.toml
//!   3. ~/.config/h2push/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::priority::Priority;
use crate::size::{ByteSize, SizeParseError};

/// Payloads at or below this many bytes are never compressed.
pub const DEFAULT_THRESHOLD: ByteSize = ByteSize::new(1024);

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub compression: CompressionSettings,
    pub files: FileSettings,
    pub push: PushSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Minimum known length, in bytes, before a payload is gzipped.
    /// Accepts an integer or a string such as "100kb".
    pub threshold: ByteSize,
    /// gzip level, 0-9.
    pub level: u32,
    /// Bytes read from a body source per write to the push stream.
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Stat files without a content-length header to learn their size.
    pub stat_for_length: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSettings {
    /// Priority used when a request does not name one.
    pub default_priority: Priority,
    /// Fill in a missing content-type from the push path's extension.
    pub infer_content_type: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            level: 6,
            chunk_size: 16 * 1024,
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            stat_for_length: true,
        }
    }
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            default_priority: Priority::LOWEST,
            infer_content_type: true,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("h2push")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid {0}: {1}")]
    InvalidSize(&'static str, SizeParseError),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PushConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            PushConfig::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a config file without consulting the environment.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("H2PUSH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&PushConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply H2PUSH_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("H2PUSH_COMPRESSION__THRESHOLD") {
            self.compression.threshold = ByteSize::parse(&v)
                .map_err(|e| ConfigError::InvalidSize("H2PUSH_COMPRESSION__THRESHOLD", e))?;
        }
        if let Ok(v) = std::env::var("H2PUSH_COMPRESSION__LEVEL") {
            if let Ok(level) = v.parse::<u32>() {
                self.compression.level = level.min(9);
            }
        }
        if let Ok(v) = std::env::var("H2PUSH_FILES__STAT_FOR_LENGTH") {
            self.files.stat_for_length = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("H2PUSH_PUSH__INFER_CONTENT_TYPE") {
            self.push.infer_content_type = v == "true" || v == "1";
        }
        Ok(())
    }
}
