//! Cache configuration shared by every store
//!
//! A `CacheContext` is built once from configuration and handed to each
//! store and loader. It owns the root directory, the filename prefix and
//! the naming scheme; it never changes after construction.

use super::entry::CacheEntry;
use crate::config::schema::CacheConfig;
use crate::error::{ShelfError, ShelfResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// How long an entry stays fresh after its file was last written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires; only an explicit remove invalidates it
    Forever,
    /// Always stale. Stores still read and write, nothing is ever a hit
    Disabled,
    /// Fresh for this many seconds after the last modification
    Seconds(u64),
}

impl Ttl {
    /// Build from signed seconds: negative never expires, zero is always stale
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => Self::Forever,
            0 => Self::Disabled,
            s => Self::Seconds(s.unsigned_abs()),
        }
    }

    /// Signed seconds, the inverse of `from_secs`
    pub fn as_secs(&self) -> i64 {
        match self {
            Self::Forever => -1,
            Self::Disabled => 0,
            Self::Seconds(s) => i64::try_from(*s).unwrap_or(i64::MAX),
        }
    }

    /// Whether a file modified at `modified` is still fresh at `now`
    pub fn is_fresh(&self, modified: SystemTime, now: SystemTime) -> bool {
        match self {
            Self::Forever => true,
            Self::Disabled => false,
            Self::Seconds(secs) => match modified.checked_add(Duration::from_secs(*secs)) {
                Some(expires_at) => now < expires_at,
                None => true,
            },
        }
    }
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Self::from_secs(secs)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forever => write!(f, "forever"),
            Self::Disabled => write!(f, "disabled"),
            Self::Seconds(s) => write!(f, "{}s", s),
        }
    }
}

/// Kind of store, which decides the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Raw bytes (`.cache`)
    Generic,
    /// Serialized values (`.var.cache`)
    Value,
    /// Captured output (`.con.cache`)
    Output,
}

impl CacheKind {
    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Generic => ".cache",
            Self::Value => ".var.cache",
            Self::Output => ".con.cache",
        }
    }

    /// Split a cache file name into its kind and the name before the extension
    pub fn split_file_name(file_name: &str) -> Option<(Self, &str)> {
        // Longest extensions first, `.cache` is a suffix of both others
        [Self::Value, Self::Output, Self::Generic]
            .into_iter()
            .find_map(|kind| {
                file_name
                    .strip_suffix(kind.extension())
                    .map(|stem| (kind, stem))
            })
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "blob",
            Self::Value => "value",
            Self::Output => "output",
        };
        write!(f, "{}", name)
    }
}

/// Process-wide cache settings, passed explicitly to every store
#[derive(Debug, Clone)]
pub struct CacheContext {
    root: PathBuf,
    prefix: String,
    enabled: bool,
    hash_names: bool,
}

impl CacheContext {
    /// Create a context rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> ShelfResult<Self> {
        let root = root.into();
        create_dirs(&root)?;
        debug!("Cache root: {}", root.display());

        Ok(Self {
            root,
            prefix: String::new(),
            enabled: true,
            hash_names: false,
        })
    }

    /// Create a context from the `[cache]` configuration section
    pub fn from_config(config: &CacheConfig) -> ShelfResult<Self> {
        Ok(Self::new(&config.root)?
            .with_prefix(config.prefix.clone())
            .with_enabled(config.enabled)
            .with_hashed_names(config.hash_names))
    }

    /// Set the filename prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable or bypass caching in the memoizing helpers
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Name files by a hash of their key instead of the key itself
    pub fn with_hashed_names(mut self, hash_names: bool) -> Self {
        self.hash_names = hash_names;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn hashes_names(&self) -> bool {
        self.hash_names
    }

    /// Physical path of the entry `name` of the given kind
    ///
    /// `/`-separated segments become sub-directories; `.`, `..` and empty
    /// segments are dropped so a key can never leave the root.
    pub fn entry_path(&self, name: &str, kind: CacheKind) -> PathBuf {
        let normalized = name.replace('\\', "/");
        let segments: Vec<&str> = Path::new(&normalized)
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        let (base, dirs) = match segments.split_last() {
            Some((base, dirs)) => (*base, dirs),
            None => ("_", &[][..]),
        };

        let base = if self.hash_names {
            hex::encode(Sha256::digest(base.as_bytes()))
        } else {
            base.to_string()
        };

        let mut path = self.root.clone();
        path.extend(dirs);
        path.push(format!("{}{}{}", self.prefix, base, kind.extension()));
        path
    }

    /// Entry handle for `name`
    pub fn entry(&self, name: &str, kind: CacheKind, ttl: Ttl) -> CacheEntry {
        CacheEntry::new(name, self.entry_path(name, kind), ttl)
    }
}

/// Create a directory tree with permissive permissions
pub(crate) fn create_dirs(path: &Path) -> ShelfResult<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }

    builder
        .create(path)
        .map_err(|e| ShelfError::CacheDirCreate {
            path: path.to_path_buf(),
            source: e,
        })
}
