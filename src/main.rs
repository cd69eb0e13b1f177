//! Shelf - cache and index maintenance CLI
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shelf::cli::{Cli, Commands};
use shelf::config::ConfigManager;
use shelf::error::{ShelfError, ShelfResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> ShelfResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        // An explicit path must exist unless we are about to create it
        Some(ref path) if !path.exists() && !matches!(cli.command, Commands::Config(_)) => {
            return Err(ShelfError::ConfigNotFound(path.clone()));
        }
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load()?;
    cli.apply_overrides(&mut config);

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("shelf=warn"),
        1 => EnvFilter::new("shelf=info"),
        _ => EnvFilter::new("shelf=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }

    debug!("Loaded config from {}", config_manager.path().display());

    match cli.command {
        Commands::Cache(args) => shelf::cli::commands::cache(args, &config),
        Commands::Index(args) => shelf::cli::commands::index(args, &config),
        Commands::Config(args) => shelf::cli::commands::config(args, &config, &config_manager),
    }
}
