//! Convenience operations layered on the stores
//!
//! Counters and compare-and-swap run their read and write under one
//! exclusive lock, so they serialize against each other and against
//! `store()` in other processes. Plain `fetch()` stays unlocked.

use super::context::{CacheContext, CacheKind, Ttl};
use super::output::OutputCache;
use super::store::CacheStore;
use super::value::ValueCache;
use crate::error::{ShelfError, ShelfResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Fetch `name`, or run `producer` and store its result on a miss
///
/// When caching is disabled on the context the producer always runs and
/// nothing is written.
pub fn variable<T, F>(ctx: &CacheContext, name: &str, ttl: Ttl, producer: F) -> ShelfResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if !ctx.is_enabled() {
        return Ok(producer());
    }

    let cache = ValueCache::<T>::new(ctx, name, ttl);
    if let Some(value) = cache.fetch() {
        return Ok(value);
    }

    cache.store(producer())
}

/// Emit the cached output of `name` to `out`, producing it on a miss
///
/// On a miss `producer` writes into a capturing `OutputCache`; the captured
/// bytes are stored and then written to `out`. Returns the emitted bytes.
pub fn content<W, F>(
    ctx: &CacheContext,
    name: &str,
    ttl: Ttl,
    compress: bool,
    out: &mut W,
    producer: F,
) -> ShelfResult<Vec<u8>>
where
    W: Write,
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let emitted = if ctx.is_enabled() {
        let mut cache = OutputCache::with_sink(ctx, name, ttl, &mut *out).compressed(compress);
        match cache.fetch() {
            Some(hit) => hit,
            None => {
                cache.start();
                producer(&mut cache)
                    .map_err(|e| ShelfError::io(format!("producing output for {}", name), e))?;
                cache.end()?.unwrap_or_default()
            }
        }
    } else {
        let mut buf = Vec::new();
        producer(&mut buf)
            .map_err(|e| ShelfError::io(format!("producing output for {}", name), e))?;
        buf
    };

    out.write_all(&emitted)
        .map_err(|e| ShelfError::io(format!("emitting output for {}", name), e))?;
    Ok(emitted)
}

/// Add `step` to the counter `name`
///
/// A missing counter is initialised to `default` as is, without adding
/// `step`. Later calls add `step` to the stored value.
pub fn increase(ctx: &CacheContext, name: &str, default: i64, step: i64, ttl: Ttl) -> ShelfResult<i64> {
    adjust(ctx, name, default, step, ttl)
}

/// Subtract `step` from the counter `name`; see [`increase`]
pub fn decrease(ctx: &CacheContext, name: &str, default: i64, step: i64, ttl: Ttl) -> ShelfResult<i64> {
    adjust(ctx, name, default, step.saturating_neg(), ttl)
}

fn adjust(ctx: &CacheContext, name: &str, default: i64, delta: i64, ttl: Ttl) -> ShelfResult<i64> {
    let cache = ValueCache::<i64>::new(ctx, name, ttl);
    let next = cache.update(|current| {
        let next = match current {
            Some(value) => value.saturating_add(delta),
            None => default,
        };
        (Some(next), next)
    })?;

    debug!("Counter {} is now {}", name, next);
    Ok(next)
}

/// Store `new` under `name` only if the current fresh value equals `old`
///
/// Returns false without writing when the entry is absent, expired under
/// `ttl`, or differs.
pub fn cas<T>(ctx: &CacheContext, name: &str, old: &T, new: T, ttl: Ttl) -> ShelfResult<bool>
where
    T: Serialize + DeserializeOwned + PartialEq,
{
    let cache = ValueCache::<T>::new(ctx, name, ttl);
    cache.update(|current| match current {
        Some(value) if value == *old => (Some(new), true),
        _ => (None, false),
    })
}

/// Remove every file and then every directory below the cache root
///
/// Children go before their parents. The root itself is kept. Returns the
/// number of files removed.
pub fn delete_all(ctx: &CacheContext) -> ShelfResult<usize> {
    let mut files = 0;
    let mut dirs = 0;

    for entry in WalkDir::new(ctx.root())
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_dir() {
            match fs::remove_dir(path) {
                Ok(()) => dirs += 1,
                Err(e) => debug!("Keeping directory {}: {}", path.display(), e),
            }
        } else {
            fs::remove_file(path)
                .map_err(|e| ShelfError::io(format!("removing {}", path.display()), e))?;
            files += 1;
        }
    }

    info!(
        "Cleared cache root {}: {} files, {} directories",
        ctx.root().display(),
        files,
        dirs
    );
    Ok(files)
}

/// A cache file found under the root
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Key relative to the root, without prefix or extension
    pub key: String,
    pub kind: CacheKind,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl EntryInfo {
    /// Whether the file was last written more than `max_age` before `now`
    pub fn is_older_than(&self, max_age: Duration, now: SystemTime) -> bool {
        let modified = SystemTime::from(self.modified);
        now.duration_since(modified)
            .map(|age| age > max_age)
            .unwrap_or(false)
    }
}

/// List cache files under the root that carry this context's prefix
pub fn list_entries(ctx: &CacheContext) -> ShelfResult<Vec<EntryInfo>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(ctx.root())
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        let Some((kind, stem)) = CacheKind::split_file_name(file_name) else {
            continue;
        };
        let Some(base) = stem.strip_prefix(ctx.prefix()) else {
            continue;
        };

        let meta = entry
            .metadata()
            .map_err(|e| ShelfError::io(format!("inspecting {}", entry.path().display()), e.into()))?;
        let modified = meta
            .modified()
            .map_err(|e| ShelfError::io(format!("reading mtime of {}", entry.path().display()), e))?;

        entries.push(EntryInfo {
            key: relative_key(ctx.root(), entry.path(), base),
            kind,
            path: entry.path().to_path_buf(),
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    Ok(entries)
}

fn relative_key(root: &Path, path: &Path, base: &str) -> String {
    let mut segments: Vec<String> = path
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    segments.push(base.to_string());
    segments.join("/")
}

/// Outcome of a garbage collection pass
#[derive(Debug, Default)]
pub struct GcReport {
    pub removed: Vec<EntryInfo>,
    pub pruned_dirs: usize,
}

/// Entries last written more than `max_age` ago
///
/// TTLs are not persisted, so age is the only signal available here.
pub fn expired_entries(ctx: &CacheContext, max_age: Duration) -> ShelfResult<Vec<EntryInfo>> {
    let now = SystemTime::now();
    Ok(list_entries(ctx)?
        .into_iter()
        .filter(|e| e.is_older_than(max_age, now))
        .collect())
}

/// Remove entries older than `max_age`, then prune empty directories
pub fn collect_garbage(ctx: &CacheContext, max_age: Duration) -> ShelfResult<GcReport> {
    let mut report = GcReport::default();

    for entry in expired_entries(ctx, max_age)? {
        match fs::remove_file(&entry.path) {
            Ok(()) => report.removed.push(entry),
            Err(e) => debug!("Skipping {}: {}", entry.path.display(), e),
        }
    }

    for dir in WalkDir::new(ctx.root())
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        // Fails harmlessly on directories that still hold files
        if fs::remove_dir(dir.path()).is_ok() {
            report.pruned_dirs += 1;
        }
    }

    info!(
        "Garbage collected {} entries, pruned {} directories",
        report.removed.len(),
        report.pruned_dirs
    );
    Ok(report)
}
