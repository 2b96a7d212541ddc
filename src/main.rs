//! cachefront - cache-first offline proxy
//!
//! CLI entry point that dispatches to subcommands.

use cachefront::cli::{Cli, Commands};
use cachefront::config::ConfigManager;
use cachefront::error::CachefrontResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
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

async fn run() -> CachefrontResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Config command must work even when the file on disk is invalid
    if let Commands::Config(args) = cli.command {
        init_logging(cli.verbose, false);
        return cachefront::cli::commands::config(args, &config_manager).await;
    }

    let config = config_manager.load().await?;
    init_logging(cli.verbose, config.general.log_format == "json");

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Serve(args) => cachefront::cli::commands::serve(args, &config).await,
        Commands::Install => cachefront::cli::commands::install(&config).await,
        Commands::Activate => cachefront::cli::commands::activate(&config).await,
        Commands::Fetch(args) => cachefront::cli::commands::fetch(args, &config).await,
        Commands::Caches(args) => cachefront::cli::commands::caches(args, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("cachefront=warn"),
        1 => EnvFilter::new("cachefront=info"),
        _ => EnvFilter::new("cachefront=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
