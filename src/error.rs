//! Error types for shelf
//!
//! All modules use `ShelfResult<T>` as their return type. Cache misses are
//! not errors: stores report them as `None`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shelf operations
pub type ShelfResult<T> = Result<T, ShelfError>;

/// All errors that can occur in shelf
#[derive(Error, Debug)]
pub enum ShelfError {
    // Cache errors
    #[error("Failed to create cache directory {path}: {source}")]
    CacheDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache entry not found: {0}")]
    EntryNotFound(String),

    // Loader errors
    #[error("Loader location does not exist: {0}")]
    LocationNotFound(PathBuf),

    #[error("The {kind} loader is already loaded, locations can no longer be added")]
    LoaderAlreadyLoaded { kind: String },

    #[error("Unknown index kind: {0}")]
    UnknownIndexKind(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    User(String),
}

impl ShelfError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheDirCreate { .. } => {
                Some("Check permissions or point --cache-dir / SHELF_CACHE_DIR elsewhere")
            }
            Self::LocationNotFound(_) => Some("Check the [index] locations in config.toml"),
            Self::UnknownIndexKind(_) => Some("Valid kinds: classes, templates, languages"),
            Self::ConfigNotFound(_) => Some("Run: shelf config init"),
            _ => None,
        }
    }
}
