//! Configuration module for the photo cache

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::paths;

/// Photo cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of decoded photos kept in memory
    #[serde(default = "default_max_decoded_entries")]
    pub max_decoded_entries: usize,

    /// Maximum estimated size of cached encoded bytes
    #[serde(default = "default_max_byte_cache_bytes")]
    pub max_byte_cache_bytes: usize,

    /// Photos fetched per preload batch
    #[serde(default = "default_preload_batch_size")]
    pub preload_batch_size: usize,

    /// Upper bound on photos considered for preloading
    #[serde(default = "default_preload_max_count")]
    pub preload_max_count: usize,

    /// Pause between preload batches in milliseconds
    #[serde(default = "default_preload_batch_delay_ms")]
    pub preload_batch_delay_ms: u64,

    /// Timeout for remote photo downloads in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Decoded photos larger than this on either side are downscaled (0 = never)
    #[serde(default = "default_max_photo_dimension")]
    pub max_photo_dimension: u32,

    /// Photo database location (defaults to the data directory)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_max_decoded_entries() -> usize {
    48
}

fn default_max_byte_cache_bytes() -> usize {
    2_000_000
}

fn default_preload_batch_size() -> usize {
    25
}

fn default_preload_max_count() -> usize {
    500
}

fn default_preload_batch_delay_ms() -> u64 {
    50
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_max_photo_dimension() -> u32 {
    720
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_decoded_entries: default_max_decoded_entries(),
            max_byte_cache_bytes: default_max_byte_cache_bytes(),
            preload_batch_size: default_preload_batch_size(),
            preload_max_count: default_preload_max_count(),
            preload_batch_delay_ms: default_preload_batch_delay_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            max_photo_dimension: default_max_photo_dimension(),
            database_path: None,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Pause between preload batches
    pub const fn preload_batch_delay(&self) -> Duration {
        Duration::from_millis(self.preload_batch_delay_ms)
    }

    /// Timeout for remote photo downloads
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Photo database location, falling back to the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => paths::database_path(),
        }
    }
}
