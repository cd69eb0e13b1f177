//! Exclusive advisory locks on cache files
//!
//! Writers hold `flock(LOCK_EX)` for the whole write so concurrent
//! producers never interleave partial contents. Readers do not lock.
//! On platforms without `flock` the lock is a no-op.

use crate::error::{ShelfError, ShelfResult};
use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A cache file opened for writing and held under an exclusive lock
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    /// Open (creating if needed, never truncating) and lock `path`
    ///
    /// Blocks until any other holder releases the lock. If the path was
    /// unlinked or replaced while waiting, the stale handle is dropped and
    /// the open is retried, so the returned lock always covers the file
    /// currently at `path`.
    pub fn open(path: &Path) -> ShelfResult<Self> {
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| ShelfError::io(format!("opening cache file {}", path.display()), e))?;

            lock_exclusive(&file)
                .map_err(|e| ShelfError::io(format!("locking cache file {}", path.display()), e))?;

            if still_linked(&file, path) {
                debug!("Locked {}", path.display());
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }
            debug!("{} changed while waiting for the lock, reopening", path.display());
        }
    }

    pub fn metadata(&self) -> ShelfResult<Metadata> {
        self.file
            .metadata()
            .map_err(|e| ShelfError::io(format!("inspecting {}", self.path.display()), e))
    }

    /// Read the whole file from the start
    pub fn read_all(&mut self) -> ShelfResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut buf))
            .map_err(|e| ShelfError::io(format!("reading {}", self.path.display()), e))?;
        Ok(buf)
    }

    /// Replace the file contents with `bytes`
    pub fn replace(&mut self, bytes: &[u8]) -> ShelfResult<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(bytes))
            .and_then(|_| self.file.flush())
            .map_err(|e| ShelfError::io(format!("writing {}", self.path.display()), e))
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(e) = unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(unix)]
fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call
        let ret = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    flock(file, libc::LOCK_EX)
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
    flock(file, libc::LOCK_UN)
}

/// Whether `path` still names the inode `file` was opened on
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> bool {
    true
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> io::Result<()> {
    Ok(())
}
