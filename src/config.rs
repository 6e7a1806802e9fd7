// SPDX-License-Identifier: MIT
//! Decoder configuration
//!
//! Values come from defaults, environment variables or a TOML file.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration file format error: {0}")]
    FileFormat(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Entries larger than this are not read from the archive
    pub max_entry_size: u64,
    /// Name of the root task-data document
    pub root_document: String,
    /// Splice externally referenced fragments into the tree
    pub resolve_fragments: bool,
    /// Replace generated identities with those from LINKLIST.XML
    pub integrate_link_list: bool,
    /// Days a TimeLog timestamp may advance between two rows
    pub time_resync_days: u16,
    /// Milliseconds a TimeLog timestamp may step back on the same day
    pub max_time_backstep_ms: i64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_entry_size: 256 * 1024 * 1024,
            root_document: "TASKDATA.XML".to_string(),
            resolve_fragments: true,
            integrate_link_list: true,
            time_resync_days: 3,
            max_time_backstep_ms: 3_600_000,
        }
    }
}

impl DecoderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entry_size: std::env::var("ISOXML_MAX_ENTRY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entry_size),
            root_document: std::env::var("ISOXML_ROOT_DOCUMENT")
                .unwrap_or(defaults.root_document),
            resolve_fragments: std::env::var("ISOXML_RESOLVE_FRAGMENTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.resolve_fragments),
            integrate_link_list: std::env::var("ISOXML_INTEGRATE_LINK_LIST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.integrate_link_list),
            time_resync_days: std::env::var("ISOXML_TIME_RESYNC_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.time_resync_days),
            max_time_backstep_ms: std::env::var("ISOXML_MAX_TIME_BACKSTEP_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_time_backstep_ms),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::FileFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entry_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_entry_size must be greater than 0".to_string(),
            ));
        }

        if self.root_document.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "root_document cannot be empty".to_string(),
            ));
        }

        if self.max_time_backstep_ms < 0 {
            return Err(ConfigError::InvalidValue(
                "max_time_backstep_ms cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}
