//! The contract shared by every cache store

use super::context::{CacheContext, CacheKind, Ttl};
use super::entry::CacheEntry;
use crate::error::ShelfResult;

/// A named, durable, TTL-bounded cache entry
///
/// Stores are cheap to construct and meant to be created per operation.
pub trait CacheStore {
    /// What `fetch` returns and `store` accepts
    type Value;

    /// The file-level entry this store reads and writes
    fn entry(&self) -> &CacheEntry;

    /// The stored value if the entry is fresh, `None` on any miss
    fn fetch(&self) -> Option<Self::Value>;

    /// Persist `value` and hand it back
    fn store(&self, value: Self::Value) -> ShelfResult<Self::Value>;

    /// Whether the entry is present, readable and not expired
    fn exists(&self) -> bool {
        self.entry().exists()
    }

    /// Delete the entry, ignoring failures
    fn remove(&self) {
        self.entry().remove()
    }
}

/// Raw byte store using the generic `.cache` extension
#[derive(Debug, Clone)]
pub struct BlobCache {
    entry: CacheEntry,
}

impl BlobCache {
    pub fn new(ctx: &CacheContext, name: &str, ttl: Ttl) -> Self {
        Self {
            entry: ctx.entry(name, CacheKind::Generic, ttl),
        }
    }
}

impl CacheStore for BlobCache {
    type Value = Vec<u8>;

    fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    fn fetch(&self) -> Option<Vec<u8>> {
        self.entry.read()
    }

    fn store(&self, value: Vec<u8>) -> ShelfResult<Vec<u8>> {
        self.entry.write(&value)?;
        Ok(value)
    }
}
