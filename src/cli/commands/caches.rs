//! Caches command - list cache generations

use crate::cli::args::{CachesArgs, OutputFormat};
use crate::config::Config;
use crate::error::CachefrontResult;
use crate::generation::GenerationNames;
use crate::storage::{create_storage, CacheStorage};
use console::style;

/// One row of the listing
#[derive(Debug, serde::Serialize)]
struct GenerationRow {
    name: String,
    entries: usize,
    current: bool,
}

/// Execute the caches command
pub async fn execute(args: CachesArgs, config: &Config) -> CachefrontResult<()> {
    let storage = create_storage(config)?;
    let names = GenerationNames::from_config(&config.worker)?;
    let rows = collect_rows(storage.as_ref(), &names).await?;

    match args.format {
        OutputFormat::Table => print_table(&rows, storage.backend_name()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

async fn collect_rows(
    storage: &dyn CacheStorage,
    names: &GenerationNames,
) -> CachefrontResult<Vec<GenerationRow>> {
    let mut rows = Vec::new();
    for name in storage.keys().await? {
        let entries = match storage.get(&name).await? {
            Some(cache) => cache.keys().await?.len(),
            None => continue,
        };
        rows.push(GenerationRow {
            current: names.is_current(&name),
            name,
            entries,
        });
    }
    Ok(rows)
}

fn print_table(rows: &[GenerationRow], backend: &str) {
    if rows.is_empty() {
        println!("No cache generations found ({} storage).", backend);
        return;
    }

    println!("{:<40} {:<10} {:<10}", "GENERATION", "ENTRIES", "STATE");
    println!("{}", "-".repeat(60));

    for row in rows {
        let state = if row.current {
            style("current").green().to_string()
        } else {
            style("stale").yellow().to_string()
        };
        println!("{:<40} {:<10} {:<10}", row.name, row.entries, state);
    }

    println!();
    println!("Total: {} generation(s)", rows.len());
}
