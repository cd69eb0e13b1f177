//! Store for emitted output
//!
//! An `OutputCache` is an `io::Write`. Between `start()` and `end()` every
//! write is captured into memory; `end()` stores what was captured. Outside
//! a capture, writes pass straight through to the wrapped sink.
//!
//! Capturing is a single flag, not a stack: a second `start()` while
//! already capturing does nothing.

use super::context::{CacheContext, CacheKind, Ttl};
use super::entry::CacheEntry;
use super::store::CacheStore;
use crate::error::{ShelfError, ShelfResult};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Stdout, Write};
use tracing::debug;

/// Capture-based cache entry wrapping an output sink
#[derive(Debug)]
pub struct OutputCache<W: Write = Stdout> {
    entry: CacheEntry,
    compress: bool,
    buffering: bool,
    buffer: Vec<u8>,
    sink: W,
}

impl OutputCache<Stdout> {
    /// Output cache passing uncaptured writes to stdout
    pub fn new(ctx: &CacheContext, name: &str, ttl: Ttl) -> Self {
        Self::with_sink(ctx, name, ttl, io::stdout())
    }
}

impl<W: Write> OutputCache<W> {
    /// Output cache passing uncaptured writes to `sink`
    pub fn with_sink(ctx: &CacheContext, name: &str, ttl: Ttl, sink: W) -> Self {
        Self {
            entry: ctx.entry(name, CacheKind::Output, ttl),
            compress: false,
            buffering: false,
            buffer: Vec::new(),
            sink,
        }
    }

    /// Store contents zlib-compressed
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Begin capturing; no-op if already capturing
    pub fn start(&mut self) {
        if self.buffering {
            return;
        }
        self.buffering = true;
        self.buffer.clear();
        debug!("Capturing output for {}", self.entry.name());
    }

    /// Stop capturing and store what was captured
    ///
    /// Without a prior `start()` there is no content: the entry is removed
    /// and `None` returned, so a later `fetch()` misses as well.
    pub fn end(&mut self) -> ShelfResult<Option<Vec<u8>>> {
        if !self.buffering {
            self.entry.remove();
            return Ok(None);
        }

        self.buffering = false;
        let content = std::mem::take(&mut self.buffer);
        self.store(content).map(Some)
    }

    /// Fetch and decode as UTF-8 text
    pub fn fetch_string(&self) -> Option<String> {
        self.fetch().and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Give back the wrapped sink
    pub fn into_sink(self) -> W {
        self.sink
    }
}

impl<W: Write> Write for OutputCache<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffering {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            self.sink.write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffering {
            Ok(())
        } else {
            self.sink.flush()
        }
    }
}

impl<W: Write> CacheStore for OutputCache<W> {
    type Value = Vec<u8>;

    fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    fn fetch(&self) -> Option<Vec<u8>> {
        let raw = self.entry.read()?;
        if !self.compress {
            return Some(raw);
        }

        match inflate(&raw) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("Cache entry {} does not decompress: {}", self.entry.name(), e);
                None
            }
        }
    }

    fn store(&self, value: Vec<u8>) -> ShelfResult<Vec<u8>> {
        if self.compress {
            let packed = deflate(&value).map_err(|e| {
                ShelfError::io(format!("compressing {}", self.entry.name()), e)
            })?;
            self.entry.write(&packed)?;
        } else {
            self.entry.write(&value)?;
        }
        Ok(value)
    }
}

fn deflate(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn inflate(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> CacheContext {
        CacheContext::new(temp.path()).unwrap()
    }

    fn backdate(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn captures_between_start_and_end() {
        let temp = TempDir::new().unwrap();
        let mut cache = OutputCache::with_sink(&context(&temp), "page", Ttl::Forever, Vec::new());

        write!(cache, "before ").unwrap();
        cache.start();
        write!(cache, "<p>captured</p>").unwrap();
        let content = cache.end().unwrap();
        write!(cache, " after").unwrap();

        assert_eq!(content.as_deref(), Some(&b"<p>captured</p>"[..]));
        assert_eq!(cache.fetch_string().as_deref(), Some("<p>captured</p>"));
        assert_eq!(cache.into_sink(), b"before  after");
    }

    #[test]
    fn second_start_does_not_compound() {
        let temp = TempDir::new().unwrap();
        let mut cache = OutputCache::with_sink(&context(&temp), "twice", Ttl::Forever, Vec::new());

        cache.start();
        write!(cache, "one ").unwrap();
        cache.start();
        assert!(cache.is_buffering());
        write!(cache, "two").unwrap();

        assert_eq!(cache.end().unwrap().as_deref(), Some(&b"one two"[..]));
        assert!(!cache.is_buffering());
        // the single end() closed the capture
        assert_eq!(cache.end().unwrap(), None);
    }

    #[test]
    fn end_without_start_stores_absence() {
        let temp = TempDir::new().unwrap();
        let mut cache = OutputCache::with_sink(&context(&temp), "none", Ttl::Forever, Vec::new());
        cache.store(b"stale".to_vec()).unwrap();

        assert_eq!(cache.end().unwrap(), None);
        assert_eq!(cache.fetch(), None);
        assert!(!cache.exists());
    }

    #[test]
    fn compressed_round_trip() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let cache = OutputCache::with_sink(&ctx, "zipped", Ttl::Forever, io::sink()).compressed(true);

        let body = "<li>row</li>".repeat(200).into_bytes();
        cache.store(body.clone()).unwrap();

        let on_disk = std::fs::read(cache.entry().path()).unwrap();
        assert!(on_disk.len() < body.len());
        assert_eq!(cache.fetch(), Some(body));

        // Reading compressed bytes without decompression yields the raw file
        let plain = OutputCache::with_sink(&ctx, "zipped", Ttl::Forever, io::sink());
        assert_eq!(plain.fetch(), Some(on_disk));
    }

    #[test]
    fn undecodable_compressed_entry_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        OutputCache::with_sink(&ctx, "junk", Ttl::Forever, io::sink())
            .store(b"definitely not zlib".to_vec())
            .unwrap();

        let cache = OutputCache::with_sink(&ctx, "junk", Ttl::Forever, io::sink()).compressed(true);
        assert_eq!(cache.fetch(), None);
    }

    #[test]
    fn expiry_scenario() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp).with_prefix("dev_");
        let cache = OutputCache::with_sink(&ctx, "templates/home", Ttl::from_secs(10), io::sink());

        cache.store(b"<p>hi</p>".to_vec()).unwrap();
        assert_eq!(
            cache.entry().path(),
            temp.path().join("templates").join("dev_home.con.cache")
        );

        backdate(cache.entry().path(), 5);
        assert_eq!(cache.fetch_string().as_deref(), Some("<p>hi</p>"));

        backdate(cache.entry().path(), 11);
        assert_eq!(cache.fetch(), None);

        cache.store(b"<p>hi</p>".to_vec()).unwrap();
        cache.remove();
        assert!(!cache.exists());
        assert!(!cache.entry().exists_at(SystemTime::UNIX_EPOCH));
    }
}
