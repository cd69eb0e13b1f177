//! Index command - build and query resource indexes

use crate::cache::CacheContext;
use crate::cli::args::{IndexAction, IndexArgs, OutputFormat};
use crate::config::Config;
use crate::error::{ShelfError, ShelfResult};
use crate::loader::{IndexKind, IndexLoader};
use crate::ui::{self, UiContext};
use console::style;
use std::path::PathBuf;

/// Execute the index command
pub fn execute(args: IndexArgs, config: &Config) -> ShelfResult<()> {
    let ctx = CacheContext::from_config(&config.cache)?;

    match args.action {
        IndexAction::Build { kind, path } => build(&ctx, config, kind.parse()?, &path),
        IndexAction::Lookup { kind, name, path } => lookup(&ctx, config, kind.parse()?, &name, &path),
        IndexAction::List { kind, format } => list(&ctx, config, kind.parse()?, format),
    }
}

fn loader(
    ctx: &CacheContext,
    config: &Config,
    kind: IndexKind,
    extra: &[PathBuf],
) -> ShelfResult<IndexLoader> {
    let mut loader = IndexLoader::from_config(ctx, kind, &config.index)?;
    loader.add_all(extra)?;
    Ok(loader)
}

/// Drop the persisted index and rescan every location
fn build(ctx: &CacheContext, config: &Config, kind: IndexKind, extra: &[PathBuf]) -> ShelfResult<()> {
    let ui_ctx = UiContext::detect();
    let mut loader = loader(ctx, config, kind, extra)?;

    loader.rebuild()?;

    let count = loader.files().map(|f| f.len()).unwrap_or(0);
    if count == 0 {
        ui::step_warn_hint(
            &ui_ctx,
            &format!("No {} files found for {}", kind.extension(), kind),
            &format!("Add locations under [index] {} or pass --path", kind),
        );
    } else {
        ui::step_ok_detail(
            &ui_ctx,
            &format!("Indexed {} {}", count, kind),
            &loader.kind().to_string(),
        );
    }
    Ok(())
}

fn lookup(
    ctx: &CacheContext,
    config: &Config,
    kind: IndexKind,
    name: &str,
    extra: &[PathBuf],
) -> ShelfResult<()> {
    let mut loader = loader(ctx, config, kind, extra)?;

    match loader.get_file(name)? {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(ShelfError::User(format!("No {} named {}", kind, name))),
    }
}

fn list(ctx: &CacheContext, config: &Config, kind: IndexKind, format: OutputFormat) -> ShelfResult<()> {
    let mut loader = loader(ctx, config, kind, &[])?;
    loader.load()?;

    let Some(files) = loader.files() else {
        return Ok(());
    };

    match format {
        OutputFormat::Table => {
            if files.is_empty() {
                println!("No {} indexed.", kind);
                return Ok(());
            }
            println!("{:<30} {}", "NAME", "PATH");
            println!("{}", "-".repeat(80));
            for (name, path) in files {
                println!("{:<30} {}", style(name).bold(), path.display());
            }
            println!();
            println!("Total: {} {}", files.len(), kind);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(files)?),
        OutputFormat::Plain => {
            for name in loader.file_names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
