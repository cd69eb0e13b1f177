//! Self-refreshing resource indexes
//!
//! A loader maps resource names to files found under its locations and
//! persists that mapping in the value cache. See [`IndexLoader`] for the
//! load and refresh rules.

pub mod index;
pub mod kinds;
pub mod resolver;

pub use index::{Index, IndexLoader, RefreshPolicy, RefreshState};
pub use kinds::{ClassLoader, IndexKind, LanguageLoader, TemplateLoader};
pub use resolver::{SymbolResolver, SymbolTable};
