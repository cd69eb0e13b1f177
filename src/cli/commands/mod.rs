//! CLI command implementations

pub mod cache;
pub mod config;
pub mod index;

pub use cache::execute as cache;
pub use config::execute as config;
pub use index::execute as index;
