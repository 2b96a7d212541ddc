//! CLI command implementations

pub mod activate;
pub mod caches;
pub mod config;
pub mod fetch;
pub mod install;
pub mod serve;

pub use activate::execute as activate;
pub use caches::execute as caches;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use serve::execute as serve;

use crate::config::Config;
use crate::error::CachefrontResult;
use crate::network::{HttpTransport, Transport};
use crate::storage::{create_storage, CacheStorage};
use crate::worker::Worker;
use std::sync::Arc;

/// Storage, transport and worker for the configured version
pub(crate) struct Runtime {
    pub storage: Arc<dyn CacheStorage>,
    pub transport: Arc<dyn Transport>,
    pub worker: Arc<Worker>,
}

impl Runtime {
    /// Build with the configured storage and a real HTTP transport
    pub fn from_config(config: &Config) -> CachefrontResult<Self> {
        let storage = create_storage(config)?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
        Self::with_parts(config, storage, transport)
    }

    pub fn with_parts(
        config: &Config,
        storage: Arc<dyn CacheStorage>,
        transport: Arc<dyn Transport>,
    ) -> CachefrontResult<Self> {
        let worker = Worker::new(&config.worker, Arc::clone(&storage), Arc::clone(&transport))?;
        Ok(Self {
            storage,
            transport,
            worker: Arc::new(worker),
        })
    }
}
