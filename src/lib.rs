//! Shelf - file-backed TTL cache and self-refreshing resource index
//!
//! Cache entries are plain files under one root directory whose
//! modification time decides freshness. Resource loaders map names to
//! files and keep that mapping in the same cache.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod ui;

pub use error::{ShelfError, ShelfResult};
