//! File-backed cache stores
//!
//! Every entry is one file under the cache root, named
//! `root/[namespace/]prefix + key + extension`. Freshness is derived from
//! the file's modification time and the entry's TTL; nothing else is
//! stored.
//!
//! # Store kinds
//!
//! | Store | Extension | Holds |
//! |-------|-----------|-------|
//! | `BlobCache` | `.cache` | raw bytes |
//! | `ValueCache<T>` | `.var.cache` | a serde value as JSON |
//! | `OutputCache<W>` | `.con.cache` | captured output, optionally zlib |
//!
//! # Concurrency
//!
//! Writes hold an exclusive advisory lock. Reads are unlocked and may
//! observe a write in progress from another process.

pub mod context;
pub mod entry;
pub mod lock;
pub mod ops;
pub mod output;
pub mod store;
pub mod value;

pub use context::{CacheContext, CacheKind, Ttl};
pub use entry::CacheEntry;
pub use ops::{
    cas, collect_garbage, content, decrease, delete_all, expired_entries, increase, list_entries,
    variable, EntryInfo, GcReport,
};
pub use output::OutputCache;
pub use store::{BlobCache, CacheStore};
pub use value::ValueCache;
