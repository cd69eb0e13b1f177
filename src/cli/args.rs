//! CLI argument definitions using clap derive

use crate::config::Config;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shelf - file-backed TTL cache and resource index
///
/// Inspects and edits the cache directory shared by shelf-based programs,
/// and builds or queries the class, template and language indexes.
#[derive(Parser, Debug)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides cache.root)
    #[arg(long, global = true, env = "SHELF_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Filename prefix for cache entries (overrides cache.prefix)
    #[arg(long, global = true, env = "SHELF_CACHE_PREFIX")]
    pub prefix: Option<String>,

    /// Development mode: rebuild an index once when a name is missing
    #[arg(long, global = true, env = "SHELF_DEVELOPMENT")]
    pub dev: bool,

    /// Bypass the cache for read-through operations
    #[arg(long, global = true)]
    pub no_cache: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref root) = self.cache_dir {
            config.cache.root = root.clone();
        }
        if let Some(ref prefix) = self.prefix {
            config.cache.prefix = prefix.clone();
        }
        if self.dev {
            config.index.development = true;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and edit cache entries
    Cache(CacheArgs),

    /// Build and query resource indexes
    Index(IndexArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache entries under the root
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print a fresh entry
    Get {
        /// Entry key, `/` separates namespaces
        key: String,

        /// Store the entry belongs to
        #[arg(short, long, default_value = "value")]
        kind: EntryKind,

        /// Seconds the entry stays fresh (negative = forever, 0 = never)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        ttl: i64,

        /// Entry was stored zlib-compressed (output entries)
        #[arg(long)]
        compressed: bool,
    },

    /// Store a value; parsed as JSON, otherwise kept as a string
    Set {
        /// Entry key
        key: String,

        /// Value to store
        value: String,

        /// Seconds the entry stays fresh (negative = forever)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        ttl: i64,
    },

    /// Increment a counter and print the new value
    Incr(CounterArgs),

    /// Decrement a counter and print the new value
    Decr(CounterArgs),

    /// Replace a value only if it currently equals OLD
    Cas {
        /// Entry key
        key: String,

        /// Expected current value (JSON)
        old: String,

        /// Replacement value (JSON)
        new: String,

        /// Seconds the current value counts as fresh (negative = forever)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        ttl: i64,
    },

    /// Run a command once and replay its cached output until it expires
    Exec {
        /// Entry key
        key: String,

        /// Seconds the output stays fresh (negative = forever)
        #[arg(long, default_value_t = 60, allow_negative_numbers = true)]
        ttl: i64,

        /// Store the output zlib-compressed
        #[arg(long)]
        compressed: bool,

        /// Command and arguments to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Remove an entry
    Drop {
        /// Entry key
        key: String,

        /// Store the entry belongs to
        #[arg(short, long, default_value = "value")]
        kind: EntryKind,
    },

    /// Remove entries last written more than N seconds ago
    Gc {
        /// Age threshold in seconds
        #[arg(long)]
        older_than: u64,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every entry under the cache root
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments shared by incr and decr
#[derive(Parser, Debug)]
pub struct CounterArgs {
    /// Counter key
    pub key: String,

    /// Amount to add or subtract
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub step: i64,

    /// Value stored when the counter does not exist yet
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub default: i64,

    /// Seconds the counter stays fresh (negative = forever)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub ttl: i64,
}

/// Which store an entry key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntryKind {
    /// Serialized value (.var.cache)
    Value,
    /// Captured output (.con.cache)
    Output,
    /// Raw bytes (.cache)
    Blob,
}

/// Arguments for the index command
#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Subcommand for index
    #[command(subcommand)]
    pub action: IndexAction,
}

/// Index subcommands
#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Rescan locations and persist a fresh index
    Build {
        /// Index kind: classes, templates or languages
        kind: String,

        /// Extra locations to scan after the configured ones
        #[arg(short, long)]
        path: Vec<PathBuf>,
    },

    /// Print the file a resource name maps to
    Lookup {
        /// Index kind: classes, templates or languages
        kind: String,

        /// Resource name (file name without extension)
        name: String,

        /// Extra locations to scan after the configured ones
        #[arg(short, long)]
        path: Vec<PathBuf>,
    },

    /// List indexed resources
    List {
        /// Index kind: classes, templates or languages
        kind: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
