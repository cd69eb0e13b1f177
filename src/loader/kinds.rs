//! The three resource loaders: classes, templates and languages
//!
//! They differ only in the extension they match and the cache key their
//! index is persisted under. The class loader also answers symbol lookups.

use super::index::{IndexLoader, RefreshPolicy};
use super::resolver::{SymbolResolver, SymbolTable};
use crate::cache::CacheContext;
use crate::config::IndexConfig;
use crate::error::{ShelfError, ShelfResult};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of resource index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Classes,
    Templates,
    Languages,
}

impl IndexKind {
    pub const ALL: [IndexKind; 3] = [Self::Classes, Self::Templates, Self::Languages];

    /// Cache key the index is persisted under
    pub fn cache_key(&self) -> &'static str {
        match self {
            Self::Classes => "classes",
            Self::Templates => "templates",
            Self::Languages => "languages",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Classes => ".class",
            Self::Templates => ".tpl",
            Self::Languages => ".lang",
        }
    }

    /// Locations configured for this kind
    pub fn locations<'a>(&self, config: &'a IndexConfig) -> &'a [PathBuf] {
        match self {
            Self::Classes => &config.classes,
            Self::Templates => &config.templates,
            Self::Languages => &config.languages,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

impl FromStr for IndexKind {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classes" | "class" => Ok(Self::Classes),
            "templates" | "template" => Ok(Self::Templates),
            "languages" | "language" => Ok(Self::Languages),
            _ => Err(ShelfError::UnknownIndexKind(s.to_string())),
        }
    }
}

impl IndexLoader {
    /// Loader for one of the built-in kinds
    pub fn for_kind(ctx: &CacheContext, kind: IndexKind, policy: RefreshPolicy) -> Self {
        Self::new(ctx, kind.cache_key(), kind.extension(), policy)
    }

    /// Loader for `kind` with its configured locations already added
    pub fn from_config(
        ctx: &CacheContext,
        kind: IndexKind,
        config: &IndexConfig,
    ) -> ShelfResult<Self> {
        let policy = RefreshPolicy::from_development(config.development);
        let mut loader = Self::for_kind(ctx, kind, policy);
        loader.add_all(kind.locations(config))?;
        Ok(loader)
    }
}

macro_rules! kind_loader {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name(IndexLoader);

        impl $name {
            pub fn new(ctx: &CacheContext, policy: RefreshPolicy) -> Self {
                Self(IndexLoader::for_kind(ctx, $kind, policy))
            }

            pub fn into_inner(self) -> IndexLoader {
                self.0
            }
        }

        impl Deref for $name {
            type Target = IndexLoader;

            fn deref(&self) -> &IndexLoader {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut IndexLoader {
                &mut self.0
            }
        }
    };
}

kind_loader!(
    /// `.class` files, persisted as `classes`
    ClassLoader => IndexKind::Classes
);
kind_loader!(
    /// `.tpl` files, persisted as `templates`
    TemplateLoader => IndexKind::Templates
);
kind_loader!(
    /// `.lang` files, persisted as `languages`
    LanguageLoader => IndexKind::Languages
);

impl ClassLoader {
    /// Hand this loader to `table` so symbol lookups reach it
    pub fn register(self, table: &mut SymbolTable) {
        table.register(Box::new(self));
    }
}

impl SymbolResolver for ClassLoader {
    fn name(&self) -> &str {
        self.kind()
    }

    fn resolve(&mut self, symbol: &str) -> ShelfResult<Option<PathBuf>> {
        self.get_file(symbol)
    }
}
