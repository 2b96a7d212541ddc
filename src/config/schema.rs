//! Configuration schema for cachefront
//!
//! Configuration is stored at `~/.config/cachefront/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache generation and lifecycle settings
    pub worker: WorkerConfig,

    /// Network transport settings
    pub network: NetworkConfig,

    /// Cache storage settings
    pub storage: StorageConfig,

    /// HTTP front end settings
    pub server: ServerConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Settings for one deployed version of the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin of the application whose requests are intercepted; requests
    /// made to the proxy itself are resolved against it
    pub origin: String,

    /// Version identifier; changing it rotates both cache generations
    pub version: String,

    /// Label of the static (install-time) generation
    pub static_label: String,

    /// Label of the dynamic (runtime) generation
    pub dynamic_label: String,

    /// Assets cached at install time, absolute or relative to `origin`
    pub manifest: Vec<String>,

    /// Document served when the network is unreachable
    pub offline_fallback: String,

    /// Activate a new version without waiting for old clients to go away
    pub skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            version: "v1".to_string(),
            static_label: "cachefront-static".to_string(),
            dynamic_label: "cachefront-dynamic".to_string(),
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/icon-192.png".to_string(),
                "/icon-512.png".to_string(),
            ],
            offline_fallback: "/index.html".to_string(),
            skip_waiting: true,
        }
    }
}

/// Network transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Upstream base URL that requests for `worker.origin` are sent to
    pub upstream: Option<String>,

    /// Largest response body accepted from the network
    pub max_body_bytes: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One directory per generation on the local filesystem
    Disk,
    /// Process-local, lost on exit
    Memory,
}

/// Cache storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend holds the cache generations
    pub backend: StorageBackend,

    /// Directory for the disk backend (defaults to the state directory)
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            path: None,
        }
    }
}

/// HTTP front end settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the proxy listens on
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
        }
    }
}
