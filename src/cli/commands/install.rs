//! Install command - populate the static generation

use crate::cli::commands::Runtime;
use crate::config::Config;
use crate::error::CachefrontResult;
use console::style;

/// Execute the install command
pub async fn execute(config: &Config) -> CachefrontResult<()> {
    let runtime = Runtime::from_config(config)?;
    let report = runtime.worker.install().await?;

    for url in &report.stored {
        println!("  {} {}", style("+").green(), url);
    }
    println!(
        "{} {} asset(s) cached in {} ({} storage)",
        style("Installed").green().bold(),
        report.stored.len(),
        style(&report.generation).cyan(),
        runtime.storage.backend_name()
    );

    Ok(())
}
