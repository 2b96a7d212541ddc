//! Configuration management for cachefront

pub mod schema;

pub use schema::{Config, StorageBackend};

use crate::error::{CachefrontError, CachefrontResult};
use crate::generation::GenerationNames;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cachefront")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cachefront")
    }

    /// Get the default directory for disk cache generations
    pub fn caches_dir() -> PathBuf {
        Self::state_dir().join("caches")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> CachefrontResult<Config> {
        let config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Config::default()
        };

        self.validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> CachefrontResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            CachefrontError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| CachefrontError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Check the values a worker needs before anything touches the network
    pub fn validate(&self, config: &Config) -> CachefrontResult<()> {
        let invalid = |reason: String| CachefrontError::ConfigInvalid {
            path: self.config_path.clone(),
            reason,
        };

        let origin = Url::parse(&config.worker.origin)
            .map_err(|e| invalid(format!("worker.origin: {}", e)))?;
        if !origin.origin().is_tuple() {
            return Err(invalid(format!(
                "worker.origin '{}' has no usable origin",
                config.worker.origin
            )));
        }

        for entry in config
            .worker
            .manifest
            .iter()
            .chain(std::iter::once(&config.worker.offline_fallback))
        {
            origin
                .join(entry)
                .map_err(|e| invalid(format!("cannot resolve '{}': {}", entry, e)))?;
        }

        if let Some(ref upstream) = config.network.upstream {
            Url::parse(upstream).map_err(|e| invalid(format!("network.upstream: {}", e)))?;
        }

        GenerationNames::from_config(&config.worker)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> CachefrontResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            CachefrontError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> CachefrontResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CachefrontError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.worker.version, "v1");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.worker.version = "v2".to_string();

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.worker.version, "v2");
    }

    #[tokio::test]
    async fn load_rejects_bad_origin() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[worker]\norigin = \"not a url\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, CachefrontError::ConfigInvalid { .. }));
        assert!(err.to_string().contains("worker.origin"));
    }

    #[test]
    fn validate_rejects_path_like_version() {
        let manager = ConfigManager::with_path(PathBuf::from("config.toml"));
        let mut config = Config::default();
        config.worker.version = "../v1".to_string();

        assert!(manager.validate(&config).is_err());
    }

    #[test]
    fn validate_rejects_bad_upstream() {
        let manager = ConfigManager::with_path(PathBuf::from("config.toml"));
        let mut config = Config::default();
        config.network.upstream = Some("::nope".to_string());

        assert!(manager.validate(&config).is_err());
    }
}
