//! Cache storage abstraction
//!
//! A `CacheStorage` holds named cache generations; each generation is a
//! `Cache` mapping request keys to responses. Puts are total replacements of
//! a single key and are atomic per key; nothing spans multiple keys.
//!
//! Backends:
//! - `DiskStorage`: one directory per generation, one file per entry
//! - `MemoryStorage`: process-local, used by tests and ephemeral runs

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::CachefrontResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// One named generation of request/response pairs
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up an exact key
    async fn match_key(&self, key: &RequestKey) -> CachefrontResult<Option<Response>>;

    /// Store a response, replacing any previous value for the key
    async fn put(&self, key: RequestKey, response: Response) -> CachefrontResult<()>;

    /// All keys currently stored
    async fn keys(&self) -> CachefrontResult<Vec<RequestKey>>;

    /// Remove one entry; returns whether it existed
    async fn delete(&self, key: &RequestKey) -> CachefrontResult<bool>;
}

/// The set of all generations
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if absent
    async fn open(&self, name: &str) -> CachefrontResult<Arc<dyn Cache>>;

    /// Get a generation only if it already exists
    async fn get(&self, name: &str) -> CachefrontResult<Option<Arc<dyn Cache>>>;

    /// Generation names in creation order
    async fn keys(&self) -> CachefrontResult<Vec<String>>;

    /// Delete a whole generation; returns whether it existed
    async fn delete(&self, name: &str) -> CachefrontResult<bool>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;

    /// Look up a key across every generation, first match in creation order wins
    async fn match_any(&self, key: &RequestKey) -> CachefrontResult<Option<Response>> {
        for name in self.keys().await? {
            // Deleted between listing and lookup: skip rather than recreate.
            let Some(cache) = self.get(&name).await? else {
                continue;
            };
            if let Some(response) = cache.match_key(key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// Create the storage backend selected in the configuration
pub fn create_storage(config: &Config) -> CachefrontResult<Arc<dyn CacheStorage>> {
    match config.storage.backend {
        StorageBackend::Disk => {
            let root = config
                .storage
                .path
                .clone()
                .unwrap_or_else(ConfigManager::caches_dir);
            Ok(Arc::new(DiskStorage::new(root)))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
