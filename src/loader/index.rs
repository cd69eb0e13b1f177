//! Extension-filtered name → path index with a persisted copy
//!
//! A loader collects locations while unloaded, then `load()` either
//! fetches the persisted index or scans the locations and persists the
//! result. Lookups that miss may trigger one rescan per loader when the
//! refresh policy allows it.

use crate::cache::{CacheContext, CacheStore, Ttl, ValueCache};
use crate::error::{ShelfError, ShelfResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Resource name → absolute file path
pub type Index = BTreeMap<String, PathBuf>;

/// Whether a lookup miss may rebuild the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Rescan once per loader when a name is missing (development)
    OnMiss,
    /// Trust the persisted index (production)
    Never,
}

impl RefreshPolicy {
    pub fn from_development(development: bool) -> Self {
        if development {
            Self::OnMiss
        } else {
            Self::Never
        }
    }
}

/// Whether this loader has spent its one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    NotYetRefreshed,
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Directory(PathBuf),
    File(PathBuf),
}

#[derive(Debug)]
enum LoaderState {
    Unloaded,
    Loaded(Index),
}

/// Index over one or more locations, filtered by a file extension
#[derive(Debug)]
pub struct IndexLoader {
    kind: String,
    extension: String,
    cache: ValueCache<Index>,
    locations: Vec<Location>,
    policy: RefreshPolicy,
    refresh: RefreshState,
    state: LoaderState,
}

impl IndexLoader {
    /// Create a loader persisting under `kind` and matching `extension`
    ///
    /// `extension` includes the leading dot and is matched case-insensitively
    /// against the end of file names.
    pub fn new(
        ctx: &CacheContext,
        kind: impl Into<String>,
        extension: impl Into<String>,
        policy: RefreshPolicy,
    ) -> Self {
        let kind = kind.into();
        Self {
            cache: ValueCache::new(ctx, &kind, Ttl::Forever),
            kind,
            extension: extension.into(),
            locations: Vec::new(),
            policy,
            refresh: RefreshState::NotYetRefreshed,
            state: LoaderState::Unloaded,
        }
    }

    /// Cache key the index is persisted under
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresh
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoaderState::Loaded(_))
    }

    /// Register a directory (scanned recursively) or a single file
    ///
    /// Fails immediately if the location does not exist or the loader has
    /// already been loaded.
    pub fn add(&mut self, location: impl AsRef<Path>) -> ShelfResult<()> {
        if self.is_loaded() {
            return Err(ShelfError::LoaderAlreadyLoaded {
                kind: self.kind.clone(),
            });
        }

        let location = location.as_ref();
        let resolved = location
            .canonicalize()
            .map_err(|_| ShelfError::LocationNotFound(location.to_path_buf()))?;

        let location = if resolved.is_dir() {
            Location::Directory(resolved)
        } else {
            Location::File(resolved)
        };
        debug!("Added {:?} to {} loader", location, self.kind);
        self.locations.push(location);
        Ok(())
    }

    /// Register several locations, stopping at the first missing one
    pub fn add_all<I, P>(&mut self, locations: I) -> ShelfResult<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for location in locations {
            self.add(location)?;
        }
        Ok(())
    }

    /// Fetch the persisted index, or scan and persist a fresh one
    pub fn load(&mut self) -> ShelfResult<()> {
        if let Some(index) = self.cache.fetch() {
            debug!("Loaded {} index from cache ({} entries)", self.kind, index.len());
            self.state = LoaderState::Loaded(index);
            return Ok(());
        }

        let index = self.scan();
        info!("Built {} index: {} entries", self.kind, index.len());
        let index = self.cache.store(index)?;
        self.state = LoaderState::Loaded(index);
        Ok(())
    }

    /// Drop the persisted index and rescan now
    ///
    /// Does not use up the refresh-on-miss allowance.
    pub fn rebuild(&mut self) -> ShelfResult<()> {
        self.cache.remove();
        self.load()
    }

    /// Path of the resource `name`, loading the index first if needed
    ///
    /// A miss (unknown name, or a file that is gone or unreadable) rebuilds
    /// the index once per loader if the policy allows, then retries.
    pub fn get_file(&mut self, name: &str) -> ShelfResult<Option<PathBuf>> {
        if !self.is_loaded() {
            self.load()?;
        }

        if let Some(path) = self.lookup(name) {
            return Ok(Some(path));
        }

        if self.policy == RefreshPolicy::OnMiss && self.refresh == RefreshState::NotYetRefreshed {
            info!("{} missing from {} index, refreshing", name, self.kind);
            self.refresh = RefreshState::Refreshed;
            self.rebuild()?;
            return Ok(self.lookup(name));
        }

        debug!("{} not found in {} index", name, self.kind);
        Ok(None)
    }

    /// The in-memory index, once loaded
    pub fn files(&self) -> Option<&Index> {
        match &self.state {
            LoaderState::Loaded(index) => Some(index),
            LoaderState::Unloaded => None,
        }
    }

    /// Indexed resource names in sorted order; empty until loaded
    pub fn file_names(&self) -> Vec<&str> {
        self.files()
            .map(|index| index.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Walk every location and build an index without touching the cache
    ///
    /// Directory matches come first in the order locations were added;
    /// explicitly added files come last and win over scanned namesakes.
    pub fn scan(&self) -> Index {
        let mut index = Index::new();

        for location in &self.locations {
            let Location::Directory(dir) = location else {
                continue;
            };

            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        if let Some(name) = self.resource_name(entry.path()) {
                            index.insert(name, entry.into_path());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable entry under {}: {}", dir.display(), e),
                }
            }
        }

        for location in &self.locations {
            if let Location::File(file) = location {
                let name = self
                    .resource_name(file)
                    .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()));
                if let Some(name) = name {
                    index.insert(name, file.clone());
                }
            }
        }

        debug!("Scanned {} locations for {}", self.locations.len(), self.kind);
        index
    }

    fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.files()?
            .get(name)
            .filter(|path| path.is_file() && File::open(path).is_ok())
            .cloned()
    }

    /// File name with the extension removed, if it carries the extension
    fn resource_name(&self, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        let split = file_name.len().checked_sub(self.extension.len())?;
        if split == 0 {
            return None;
        }

        let (stem, suffix) = (file_name.get(..split)?, file_name.get(split..)?);
        suffix
            .eq_ignore_ascii_case(&self.extension)
            .then(|| stem.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _cache: TempDir,
        tree: TempDir,
        ctx: CacheContext,
    }

    fn fixture() -> Fixture {
        let cache = TempDir::new().unwrap();
        let tree = TempDir::new().unwrap();
        let ctx = CacheContext::new(cache.path()).unwrap();
        Fixture {
            _cache: cache,
            tree,
            ctx,
        }
    }

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, rel).unwrap();
        path.canonicalize().unwrap()
    }

    fn loader(fx: &Fixture, policy: RefreshPolicy) -> IndexLoader {
        IndexLoader::new(&fx.ctx, "templates", ".tpl", policy)
    }

    #[test]
    fn scans_recursively_and_filters_extension() {
        let fx = fixture();
        let home = touch(fx.tree.path(), "home.tpl");
        let nested = touch(fx.tree.path(), "admin/users/list.TPL");
        touch(fx.tree.path(), "readme.md");
        touch(fx.tree.path(), "admin/.tpl");

        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();

        assert_eq!(loader.file_names(), vec!["home", "list"]);
        let files = loader.files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files.get("home"), Some(&home));
        assert_eq!(files.get("list"), Some(&nested));
    }

    #[test]
    fn load_persists_and_reuses_index() {
        let fx = fixture();
        touch(fx.tree.path(), "home.tpl");

        let mut first = loader(&fx, RefreshPolicy::Never);
        first.add(fx.tree.path()).unwrap();
        first.load().unwrap();

        // A file added after the first load is invisible to later loaders
        touch(fx.tree.path(), "late.tpl");
        let mut second = loader(&fx, RefreshPolicy::Never);
        second.add(fx.tree.path()).unwrap();
        second.load().unwrap();

        assert_eq!(first.files(), second.files());
        assert!(second.files().unwrap().get("late").is_none());
    }

    #[test]
    fn scan_is_deterministic() {
        let fx = fixture();
        for rel in ["b.tpl", "a/c.tpl", "a/b/d.tpl", "z/e.tpl"] {
            touch(fx.tree.path(), rel);
        }

        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.add(fx.tree.path()).unwrap();

        assert_eq!(loader.scan(), loader.scan());
    }

    #[test]
    fn explicit_files_are_registered_and_win() {
        let fx = fixture();
        touch(fx.tree.path(), "views/home.tpl");
        let special = touch(fx.tree.path(), "special/home.tpl");
        let odd = touch(fx.tree.path(), "special/layout.html");

        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader
            .add_all([special.clone(), odd.clone(), fx.tree.path().join("views")])
            .unwrap();

        assert_eq!(loader.get_file("home").unwrap(), Some(special));
        assert_eq!(loader.get_file("layout").unwrap(), Some(odd));
    }

    #[test]
    fn add_fails_fast_on_missing_location() {
        let fx = fixture();
        let mut loader = loader(&fx, RefreshPolicy::Never);

        let err = loader.add(fx.tree.path().join("missing")).unwrap_err();
        assert!(matches!(err, ShelfError::LocationNotFound(_)));
    }

    #[test]
    fn add_after_load_is_rejected() {
        let fx = fixture();
        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.load().unwrap();

        let err = loader.add(fx.tree.path()).unwrap_err();
        assert!(matches!(err, ShelfError::LoaderAlreadyLoaded { .. }));
    }

    #[test]
    fn get_file_loads_lazily() {
        let fx = fixture();
        let home = touch(fx.tree.path(), "home.tpl");

        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.add(fx.tree.path()).unwrap();
        assert!(!loader.is_loaded());

        assert_eq!(loader.get_file("home").unwrap(), Some(home));
        assert!(loader.is_loaded());
    }

    #[test]
    fn refresh_on_miss_happens_once() {
        let fx = fixture();
        touch(fx.tree.path(), "home.tpl");

        let mut loader = loader(&fx, RefreshPolicy::OnMiss);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();

        let first_new = touch(fx.tree.path(), "first.tpl");
        assert_eq!(loader.get_file("first").unwrap(), Some(first_new));
        assert_eq!(loader.refresh_state(), RefreshState::Refreshed);

        // The allowance is spent: later misses do not rescan
        touch(fx.tree.path(), "second.tpl");
        assert_eq!(loader.get_file("second").unwrap(), None);
        assert_eq!(loader.get_file("second").unwrap(), None);
        assert!(loader.files().unwrap().get("second").is_none());
    }

    #[test]
    fn refresh_persists_the_rebuilt_index() {
        let fx = fixture();
        let mut loader = loader(&fx, RefreshPolicy::OnMiss);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();

        touch(fx.tree.path(), "new.tpl");
        loader.get_file("new").unwrap();

        let persisted = ValueCache::<Index>::new(&fx.ctx, "templates", Ttl::Forever)
            .fetch()
            .unwrap();
        assert_eq!(Some(&persisted), loader.files());
    }

    #[test]
    fn no_refresh_when_disabled() {
        let fx = fixture();
        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();

        touch(fx.tree.path(), "new.tpl");
        assert_eq!(loader.get_file("new").unwrap(), None);
        assert_eq!(loader.refresh_state(), RefreshState::NotYetRefreshed);
    }

    #[test]
    fn deleted_file_is_a_miss() {
        let fx = fixture();
        let home = touch(fx.tree.path(), "home.tpl");

        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();
        fs::remove_file(&home).unwrap();

        assert_eq!(loader.get_file("home").unwrap(), None);
    }

    #[test]
    fn directory_in_place_of_file_is_a_miss() {
        let fx = fixture();
        let home = touch(fx.tree.path(), "home.tpl");

        let mut loader = loader(&fx, RefreshPolicy::Never);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();
        fs::remove_file(&home).unwrap();
        fs::create_dir(&home).unwrap();

        assert_eq!(loader.get_file("home").unwrap(), None);
    }

    #[test]
    fn deleted_file_refresh_drops_it_from_index() {
        let fx = fixture();
        let home = touch(fx.tree.path(), "home.tpl");

        let mut loader = loader(&fx, RefreshPolicy::OnMiss);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();
        fs::remove_file(&home).unwrap();

        assert_eq!(loader.get_file("home").unwrap(), None);
        assert!(loader.files().unwrap().is_empty());
    }

    #[test]
    fn rebuild_keeps_refresh_allowance() {
        let fx = fixture();
        let mut loader = loader(&fx, RefreshPolicy::OnMiss);
        loader.add(fx.tree.path()).unwrap();
        loader.load().unwrap();

        touch(fx.tree.path(), "a.tpl");
        loader.rebuild().unwrap();
        assert!(loader.files().unwrap().contains_key("a"));
        assert_eq!(loader.refresh_state(), RefreshState::NotYetRefreshed);
    }
}
