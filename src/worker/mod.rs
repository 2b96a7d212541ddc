//! Versioned worker lifecycle
//!
//! A `Worker` is one deployed version: its generation names, manifest and
//! fetch policy. It moves through explicit phases:
//!
//! | State | Meaning |
//! |-------|---------|
//! | Parsed | Built from config, nothing cached yet |
//! | Installing | Static generation being populated |
//! | Installed | Install finished (or failed and was logged), waiting to activate |
//! | Activating | Stale generations being deleted |
//! | Activated | Serving fetches |
//! | Redundant | Replaced by a newer version |
//!
//! `Registration` sequences these phases and routes fetches to the active worker.

mod activator;
mod clients;
mod installer;
mod interceptor;
mod registration;

pub use activator::{ActivationReport, Activator};
pub use clients::ClientSet;
pub use installer::{InstallReport, Installer};
pub use interceptor::{FetchOutcome, Interceptor, Responded, ResponseSource};
pub use registration::Registration;

use crate::config::schema::WorkerConfig;
use crate::error::{CachefrontError, CachefrontResult};
use crate::generation::GenerationNames;
use crate::http::Request;
use crate::network::Transport;
use crate::storage::CacheStorage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use url::Url;

/// Lifecycle phase of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Message posted by a page to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate a waiting version now instead of waiting for old clients
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

/// Resolve a manifest entry against the origin
fn resolve(origin: &Url, entry: &str) -> CachefrontResult<Url> {
    origin
        .join(entry)
        .map_err(|e| CachefrontError::invalid_url(entry, e))
}

/// One deployed version of the cache
pub struct Worker {
    version: String,
    names: GenerationNames,
    manifest: Vec<Url>,
    skip_waiting_on_install: bool,
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    interceptor: Interceptor,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    /// Build a worker for the configured version
    pub fn new(
        config: &WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        transport: Arc<dyn Transport>,
    ) -> CachefrontResult<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| CachefrontError::invalid_url(&config.origin, e))?;
        let names = GenerationNames::from_config(config)?;
        let manifest = config
            .manifest
            .iter()
            .map(|entry| resolve(&origin, entry))
            .collect::<CachefrontResult<Vec<_>>>()?;
        let offline_fallback = resolve(&origin, &config.offline_fallback)?;

        let interceptor = Interceptor::new(
            Arc::clone(&storage),
            Arc::clone(&transport),
            origin,
            names.dynamic_name(),
            offline_fallback,
        );

        Ok(Self {
            version: config.version.clone(),
            names,
            manifest,
            skip_waiting_on_install: config.skip_waiting,
            storage,
            transport,
            interceptor,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn names(&self) -> &GenerationNames {
        &self.names
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        debug!("Worker {} -> {}", self.version, state);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Ask to be activated without waiting for the previous version's clients
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Install phase: populate the static generation
    ///
    /// Skip-waiting is requested (when configured) whether or not the install
    /// succeeds; the caller decides what to do with a failure.
    pub async fn install(&self) -> CachefrontResult<InstallReport> {
        info!("Installing version {}", self.version);
        self.set_state(WorkerState::Installing);

        let result = Installer::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.transport),
            self.names.static_name(),
            self.manifest.clone(),
        )
        .install()
        .await;

        if self.skip_waiting_on_install {
            self.skip_waiting();
        }
        self.set_state(WorkerState::Installed);
        result
    }

    /// Activate phase: delete stale generations, then claim clients
    pub async fn activate(&self, clients: Arc<ClientSet>) -> ActivationReport {
        info!("Activating version {}", self.version);
        self.set_state(WorkerState::Activating);

        let report = Activator::new(
            Arc::clone(&self.storage),
            self.names.clone(),
            clients,
            self.version.clone(),
        )
        .activate()
        .await;

        self.set_state(WorkerState::Activated);
        report
    }

    /// Fetch phase: apply the cache-first policy to one request
    pub async fn fetch(&self, request: &Request) -> CachefrontResult<FetchOutcome> {
        self.interceptor.handle(request).await
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("version", &self.version)
            .field("names", &self.names)
            .field("state", &self.state())
            .finish()
    }
}
