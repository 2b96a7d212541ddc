//! Activate command - delete generations from other versions

use crate::cli::commands::Runtime;
use crate::config::Config;
use crate::error::CachefrontResult;
use crate::worker::ClientSet;
use console::style;
use std::sync::Arc;

/// Execute the activate command
pub async fn execute(config: &Config) -> CachefrontResult<()> {
    let runtime = Runtime::from_config(config)?;
    let report = runtime.worker.activate(Arc::new(ClientSet::new())).await;

    for name in &report.deleted {
        println!("  {} {}", style("-").red(), name);
    }
    for (name, reason) in &report.failed {
        println!("  {} {}: {}", style("!").yellow(), name, reason);
    }

    if report.deleted.is_empty() && report.failed.is_empty() {
        println!("No stale cache generations.");
    }
    println!(
        "{} version {}",
        style("Activated").green().bold(),
        style(runtime.worker.version()).cyan()
    );

    Ok(())
}
