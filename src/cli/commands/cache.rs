//! Cache command - inspect or clear the local cache store

use crate::cache::{EntryManifest, LocalCacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::DeployResult;
use console::style;
use std::io::{self, Write};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DeployResult<()> {
    let store = LocalCacheStore::new(config.cache.store_dir());

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Clear { yes } => clear_entries(&store, yes).await,
    }
}

/// List stored cache entries
async fn list_entries(store: &LocalCacheStore, format: OutputFormat) -> DeployResult<()> {
    let entries = store.list().await?;

    match format {
        OutputFormat::Table => print_entry_table(store, &entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }

    Ok(())
}

fn print_entry_table(store: &LocalCacheStore, entries: &[EntryManifest]) {
    if entries.is_empty() {
        println!("No cache entries in {}.", store.root().display());
        return;
    }

    println!(
        "{:<40} {:>8} {:>10} {:<20}",
        "KEY", "FILES", "SIZE", "CREATED"
    );
    println!("{}", "-".repeat(81));

    for entry in entries {
        println!(
            "{:<40} {:>8} {:>10} {:<20}",
            entry.key,
            entry.files,
            format_size(entry.size_bytes),
            entry.created_at.format("%Y-%m-%d %H:%M").to_string()
        );
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!();
    println!(
        "Total: {} entr(ies), {} in {}",
        entries.len(),
        format_size(total),
        store.root().display()
    );
}

/// Remove every stored entry
async fn clear_entries(store: &LocalCacheStore, skip_confirm: bool) -> DeployResult<()> {
    let entries = store.list().await?;

    if entries.is_empty() {
        println!("No cache entries to clear.");
        return Ok(());
    }

    println!("This will remove {} cache entr(ies):", entries.len());
    for entry in &entries {
        println!("  {} {}", style("•").red(), entry.key);
    }
    println!();

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = store.clear().await?;
    println!("{} cleared {} cache entr(ies)", style("✓").green(), removed);

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
