//! Cache command - inspect and edit cache entries

use crate::cache::{
    cas, collect_garbage, content, decrease, delete_all, expired_entries, increase, list_entries,
    BlobCache, CacheContext, CacheStore, EntryInfo, OutputCache, Ttl, ValueCache,
};
use crate::cli::args::{CacheAction, CacheArgs, CounterArgs, EntryKind, OutputFormat};
use crate::config::Config;
use crate::error::{ShelfError, ShelfResult};
use crate::ui::{self, UiContext};
use chrono::Utc;
use console::style;
use serde_json::Value;
use std::io::{self, Write};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Execute the cache command
pub fn execute(args: CacheArgs, config: &Config) -> ShelfResult<()> {
    let ctx = CacheContext::from_config(&config.cache)?;
    debug!("Using cache root {}", ctx.root().display());

    match args.action {
        CacheAction::List { format } => list(&ctx, format),
        CacheAction::Get {
            key,
            kind,
            ttl,
            compressed,
        } => get(&ctx, &key, kind, Ttl::from_secs(ttl), compressed),
        CacheAction::Set { key, value, ttl } => set(&ctx, &key, &value, Ttl::from_secs(ttl)),
        CacheAction::Incr(args) => counter(&ctx, args, false),
        CacheAction::Decr(args) => counter(&ctx, args, true),
        CacheAction::Cas { key, old, new, ttl } => {
            compare_and_swap(&ctx, &key, &old, &new, Ttl::from_secs(ttl))
        }
        CacheAction::Exec {
            key,
            ttl,
            compressed,
            command,
        } => exec(&ctx, &key, Ttl::from_secs(ttl), compressed, &command),
        CacheAction::Drop { key, kind } => drop_entry(&ctx, &key, kind),
        CacheAction::Gc {
            older_than,
            dry_run,
        } => gc(&ctx, Duration::from_secs(older_than), dry_run),
        CacheAction::Clear { yes } => clear(&ctx, yes),
    }
}

/// List all entries carrying the configured prefix
fn list(ctx: &CacheContext, format: OutputFormat) -> ShelfResult<()> {
    let entries = list_entries(ctx)?;

    if entries.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cache entries found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[EntryInfo]) {
    println!(
        "{:<40} {:<8} {:>10} {:<20}",
        "KEY", "KIND", "SIZE", "MODIFIED"
    );
    println!("{}", "-".repeat(80));

    for entry in entries {
        let modified = entry.modified.format("%Y-%m-%d %H:%M:%S").to_string();
        println!(
            "{:<40} {:<8} {:>10} {:<20}",
            entry.key, entry.kind, entry.size, modified
        );
    }

    println!();
    println!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}

fn print_entry_json(entries: &[EntryInfo]) -> ShelfResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson {
        key: String,
        kind: String,
        path: String,
        size: u64,
        modified: String,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            key: e.key.clone(),
            kind: e.kind.to_string(),
            path: e.path.display().to_string(),
            size: e.size,
            modified: e.modified.to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_entry_plain(entries: &[EntryInfo]) {
    for entry in entries {
        println!("{}", entry.key);
    }
}

/// Print a fresh entry to stdout
fn get(ctx: &CacheContext, key: &str, kind: EntryKind, ttl: Ttl, compressed: bool) -> ShelfResult<()> {
    let not_found = || ShelfError::EntryNotFound(key.to_string());

    match kind {
        EntryKind::Value => {
            let value = ValueCache::<Value>::new(ctx, key, ttl)
                .fetch()
                .ok_or_else(not_found)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        EntryKind::Output => {
            let bytes = OutputCache::with_sink(ctx, key, ttl, io::sink())
                .compressed(compressed)
                .fetch()
                .ok_or_else(not_found)?;
            write_stdout(&bytes)?;
        }
        EntryKind::Blob => {
            let bytes = BlobCache::new(ctx, key, ttl).fetch().ok_or_else(not_found)?;
            write_stdout(&bytes)?;
        }
    }

    Ok(())
}

/// Store a value, falling back to a JSON string when it does not parse
fn set(ctx: &CacheContext, key: &str, raw: &str, ttl: Ttl) -> ShelfResult<()> {
    let value = parse_value(raw);
    let cache = ValueCache::<Value>::new(ctx, key, ttl);
    cache.store(value)?;

    let ui_ctx = UiContext::detect();
    ui::step_ok_detail(
        &ui_ctx,
        &format!("Stored {}", key),
        &format!("ttl {}", ttl),
    );
    Ok(())
}

fn counter(ctx: &CacheContext, args: CounterArgs, down: bool) -> ShelfResult<()> {
    let ttl = Ttl::from_secs(args.ttl);
    let value = if down {
        decrease(ctx, &args.key, args.default, args.step, ttl)?
    } else {
        increase(ctx, &args.key, args.default, args.step, ttl)?
    };

    println!("{}", value);
    Ok(())
}

fn compare_and_swap(ctx: &CacheContext, key: &str, old: &str, new: &str, ttl: Ttl) -> ShelfResult<()> {
    let swapped = cas(ctx, key, &parse_value(old), parse_value(new), ttl)?;

    if swapped {
        println!("{} swapped {}", style("✓").green(), key);
        Ok(())
    } else {
        Err(ShelfError::User(format!(
            "{} does not hold the expected value, nothing written",
            key
        )))
    }
}

/// Replay the cached stdout of a command, running it on a miss
fn exec(
    ctx: &CacheContext,
    key: &str,
    ttl: Ttl,
    compressed: bool,
    command: &[String],
) -> ShelfResult<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ShelfError::User("No command given".to_string()))?;

    let mut stdout = io::stdout().lock();
    content(ctx, key, ttl, compressed, &mut stdout, |out| {
        debug!("Running {} for {}", program, key);
        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            io::stderr().write_all(&output.stderr)?;
            return Err(io::Error::other(format!(
                "{} exited with {}",
                program, output.status
            )));
        }
        out.write_all(&output.stdout)
    })?;

    stdout
        .flush()
        .map_err(|e| ShelfError::io("flushing stdout", e))
}

fn drop_entry(ctx: &CacheContext, key: &str, kind: EntryKind) -> ShelfResult<()> {
    let ttl = Ttl::Forever;
    match kind {
        EntryKind::Value => ValueCache::<Value>::new(ctx, key, ttl).remove(),
        EntryKind::Output => OutputCache::with_sink(ctx, key, ttl, io::sink()).remove(),
        EntryKind::Blob => BlobCache::new(ctx, key, ttl).remove(),
    }

    ui::step_ok(&UiContext::detect(), &format!("Dropped {}", key));
    Ok(())
}

/// Remove entries older than the threshold
fn gc(ctx: &CacheContext, max_age: Duration, dry_run: bool) -> ShelfResult<()> {
    let expired = expired_entries(ctx, max_age)?;

    if expired.is_empty() {
        println!("No entries older than {}s.", max_age.as_secs());
        return Ok(());
    }

    println!(
        "Found {} entr{} older than {}s:",
        expired.len(),
        if expired.len() == 1 { "y" } else { "ies" },
        max_age.as_secs()
    );

    let now = Utc::now();
    for entry in &expired {
        let age = (now - entry.modified).num_seconds();
        println!("  {} {} ({}s old)", style("•").red(), entry.key, age);
    }

    if dry_run {
        println!();
        println!("Dry run - no entries removed.");
        return Ok(());
    }

    let report = collect_garbage(ctx, max_age)?;
    println!();
    println!(
        "{} removed {} entr{}, pruned {} director{}",
        style("✓").green(),
        report.removed.len(),
        if report.removed.len() == 1 { "y" } else { "ies" },
        report.pruned_dirs,
        if report.pruned_dirs == 1 { "y" } else { "ies" }
    );

    Ok(())
}

/// Clear everything below the cache root
fn clear(ctx: &CacheContext, yes: bool) -> ShelfResult<()> {
    let ui_ctx = UiContext::detect().with_auto_yes(yes);
    let entries = list_entries(ctx)?;

    println!(
        "This will remove everything under {} ({} entr{} with the current prefix)",
        ctx.root().display(),
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" }
    );

    if !ui::confirm(&ui_ctx, "Clear the cache?", false)? {
        println!("Aborted.");
        return Ok(());
    }

    let removed = delete_all(ctx)?;
    println!("{} cleared {} file(s)", style("✓").green(), removed);

    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn write_stdout(bytes: &[u8]) -> ShelfResult<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|e| ShelfError::io("writing to stdout", e))
}
