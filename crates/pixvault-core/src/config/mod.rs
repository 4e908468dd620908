//! Configuration management for Pixvault.
//!
//! Configuration is loaded from the platform config directory
//! (`.../pixvault/config.toml`) with sensible defaults. Long-running callers
//! should go through [`ConfigStore`], which hands out immutable, versioned
//! snapshots and reloads them when the file changes on disk.

mod store;
mod types;
mod validate;

pub use store::{ConfigSnapshot, ConfigStore};
pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Pixvault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage roots and catalog location
    pub storage: StorageConfig,

    /// Upload limits
    pub upload: UploadConfig,

    /// List pagination
    pub pagination: PaginationConfig,

    /// Thumbnail synthesis
    pub thumbnail: ThumbnailConfig,

    /// Free-text search service
    pub ai: AiConfig,

    /// Public link construction
    pub links: LinksConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.pixvault.pixvault/config.toml
    /// - Linux: ~/.config/pixvault/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pixvault\config\config.toml
    ///
    /// Falls back to ~/.pixvault/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pixvault", "pixvault")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".pixvault").join("config.toml")
            })
    }

    /// Resolved storage root (with ~ expansion).
    pub fn storage_root(&self) -> PathBuf {
        expand(&self.storage.root_dir)
    }

    /// Resolved backup root (with ~ expansion).
    pub fn backup_root(&self) -> PathBuf {
        expand(&self.storage.backup_dir)
    }

    /// Resolved catalog database path (with ~ expansion).
    pub fn database_path(&self) -> PathBuf {
        expand(&self.storage.database)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}
