//! Configuration schema for shelf
//!
//! Configuration is stored at `~/.config/shelf/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache store settings
    pub cache: CacheConfig,

    /// Resource index settings
    pub index: IndexConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for every cache file
    pub root: PathBuf,

    /// Filename prefix, e.g. "dev_" to keep a development cache apart
    pub prefix: String,

    /// When false, memoizing helpers always run their producer
    pub enabled: bool,

    /// Store entries under a SHA-256 of their name instead of the name itself
    pub hash_names: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            prefix: String::new(),
            enabled: true,
            hash_names: false,
        }
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelf")
}

/// Resource index configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Rebuild an index once when a lookup misses
    pub development: bool,

    /// Directories or files indexed by the class loader
    pub classes: Vec<PathBuf>,

    /// Directories or files indexed by the template loader
    pub templates: Vec<PathBuf>,

    /// Directories or files indexed by the language loader
    pub languages: Vec<PathBuf>,
}
