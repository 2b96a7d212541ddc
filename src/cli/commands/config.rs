//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::{CachefrontError, CachefrontResult};
use console::style;
use std::path::PathBuf;

/// Execute the config command
///
/// `path` and `init` work even when the existing file does not load.
pub async fn execute(args: ConfigArgs, manager: &ConfigManager) -> CachefrontResult<()> {
    match args.action {
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        None | Some(ConfigAction::Show) => show_config(&manager.load().await?)?,
        Some(ConfigAction::Set { key, value }) => {
            let mut config = manager.load().await?;
            set_value(&mut config, &key, &value)?;
            manager.validate(&config)?;
            manager.save(&config).await?;
            println!("{} Set {} = {}", style("✓").green(), key, value);
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> CachefrontResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> CachefrontResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

/// Apply a dot-separated key to the configuration
fn set_value(config: &mut Config, key: &str, value: &str) -> CachefrontResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["worker", "origin"] => config.worker.origin = value.to_string(),
        ["worker", "version"] => config.worker.version = value.to_string(),
        ["worker", "static_label"] => config.worker.static_label = value.to_string(),
        ["worker", "dynamic_label"] => config.worker.dynamic_label = value.to_string(),
        ["worker", "manifest"] => config.worker.manifest = parse_list(value),
        ["worker", "offline_fallback"] => config.worker.offline_fallback = value.to_string(),
        ["worker", "skip_waiting"] => config.worker.skip_waiting = parse_bool(value)?,

        ["network", "upstream"] => config.network.upstream = parse_optional(value),
        ["network", "max_body_bytes"] => config.network.max_body_bytes = parse_u64(value)?,

        ["storage", "backend"] => config.storage.backend = parse_backend(value)?,
        ["storage", "path"] => config.storage.path = parse_optional(value).map(PathBuf::from),

        ["server", "listen"] => config.server.listen = value.to_string(),

        _ => {
            return Err(CachefrontError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "worker.origin",
    "worker.version",
    "worker.static_label",
    "worker.dynamic_label",
    "worker.manifest",
    "worker.offline_fallback",
    "worker.skip_waiting",
    "network.upstream",
    "network.max_body_bytes",
    "storage.backend",
    "storage.path",
    "server.listen",
];

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Empty string or "none" clears an optional value
fn parse_optional(value: &str) -> Option<String> {
    match value.trim() {
        "" | "none" => None,
        v => Some(v.to_string()),
    }
}

fn parse_log_format(value: &str) -> CachefrontResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(CachefrontError::User(format!(
            "Invalid log format: {}. Use text/json",
            value
        ))),
    }
}

fn parse_backend(value: &str) -> CachefrontResult<StorageBackend> {
    match value.to_lowercase().as_str() {
        "disk" => Ok(StorageBackend::Disk),
        "memory" => Ok(StorageBackend::Memory),
        _ => Err(CachefrontError::User(format!(
            "Invalid storage backend: {}. Use disk/memory",
            value
        ))),
    }
}

fn parse_bool(value: &str) -> CachefrontResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CachefrontError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> CachefrontResult<u64> {
    value
        .parse()
        .map_err(|_| CachefrontError::User(format!("Invalid number: {}", value)))
}
