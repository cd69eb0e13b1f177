//! A single named cache file and its freshness rules
//!
//! An entry exists and is fresh iff its file is present, readable and
//! still inside its TTL, measured from the file's modification time.
//! No metadata is stored beside the file.

use super::context::{create_dirs, Ttl};
use super::lock::LockedFile;
use crate::error::ShelfResult;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Handle to one cache file
#[derive(Debug, Clone)]
pub struct CacheEntry {
    name: String,
    file: PathBuf,
    ttl: Ttl,
}

impl CacheEntry {
    pub(crate) fn new(name: &str, file: PathBuf, ttl: Ttl) -> Self {
        Self {
            name: name.to_string(),
            file,
            ttl,
        }
    }

    /// Logical key this entry was created for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical file backing this entry
    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    /// Last modification time of the backing file, if present
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.file).and_then(|m| m.modified()).ok()
    }

    /// Time since the backing file was last written
    pub fn age(&self) -> Option<Duration> {
        self.modified()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
    }

    /// Freshness predicate at the current wall-clock time
    pub fn exists(&self) -> bool {
        self.exists_at(SystemTime::now())
    }

    /// Freshness predicate evaluated at `now`
    pub fn exists_at(&self, now: SystemTime) -> bool {
        let modified = match fs::metadata(&self.file) {
            Ok(meta) if meta.is_file() => match meta.modified() {
                Ok(modified) => modified,
                Err(_) => return false,
            },
            _ => return false,
        };

        self.ttl.is_fresh(modified, now) && File::open(&self.file).is_ok()
    }

    /// Raw contents when fresh; every failure is a miss
    pub fn read(&self) -> Option<Vec<u8>> {
        if !self.exists() {
            debug!("Cache miss: {}", self.name);
            return None;
        }

        match fs::read(&self.file) {
            Ok(bytes) => {
                debug!("Cache hit: {}", self.name);
                Some(bytes)
            }
            Err(e) => {
                debug!("Cache entry {} unreadable: {}", self.name, e);
                None
            }
        }
    }

    /// Write `bytes` under an exclusive lock, creating parent directories
    pub fn write(&self, bytes: &[u8]) -> ShelfResult<()> {
        self.ensure_parent()?;

        let mut locked = LockedFile::open(&self.file)?;
        locked.replace(bytes)?;

        debug!("Stored {} ({} bytes, ttl {})", self.name, bytes.len(), self.ttl);
        Ok(())
    }

    /// Read-modify-write under a single lock acquisition
    ///
    /// `f` receives the current contents (`None` when absent, empty or
    /// stale) and returns the replacement plus a result. Returning `None`
    /// as the replacement leaves a stored value untouched. Presence is
    /// judged only after the lock is held.
    pub fn update<R>(&self, f: impl FnOnce(Option<Vec<u8>>) -> (Option<Vec<u8>>, R)) -> ShelfResult<R> {
        self.ensure_parent()?;

        let mut locked = LockedFile::open(&self.file)?;

        let meta = locked.metadata()?;
        let present = meta.len() > 0;
        let fresh = present
            && meta
                .modified()
                .map(|m| self.ttl.is_fresh(m, SystemTime::now()))
                .unwrap_or(false);

        let current = if fresh { Some(locked.read_all()?) } else { None };
        let (replacement, result) = f(current);

        match replacement {
            Some(bytes) => {
                locked.replace(&bytes)?;
                debug!("Updated {} ({} bytes)", self.name, bytes.len());
            }
            None if !present => {
                // Empty file from the lock-open; waiters on it reopen the path
                let _ = fs::remove_file(&self.file);
            }
            None => {}
        }

        Ok(result)
    }

    /// Best-effort delete; a missing file is already the desired state
    pub fn remove(&self) {
        match fs::remove_file(&self.file) {
            Ok(()) => debug!("Dropped cache entry {}", self.name),
            Err(e) => debug!("Drop of {} ignored: {}", self.name, e),
        }
    }

    fn ensure_parent(&self) -> ShelfResult<()> {
        match self.file.parent() {
            Some(parent) => create_dirs(parent),
            None => Ok(()),
        }
    }
}
