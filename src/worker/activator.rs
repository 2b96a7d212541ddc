//! Activate phase: drop stale generations, then claim open clients
//!
//! Deletions run concurrently and are independent; one failure never blocks
//! the others. Clients are claimed only after every deletion has settled.

use crate::generation::GenerationNames;
use crate::storage::CacheStorage;
use crate::worker::clients::ClientSet;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of an activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale generations removed
    pub deleted: Vec<String>,
    /// Stale generations that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
    /// Number of clients now controlled by this version
    pub claimed: usize,
}

/// Garbage-collects generations that do not belong to the current version
pub struct Activator {
    storage: Arc<dyn CacheStorage>,
    names: GenerationNames,
    clients: Arc<ClientSet>,
    version: String,
}

impl Activator {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        names: GenerationNames,
        clients: Arc<ClientSet>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            names,
            clients,
            version: version.into(),
        }
    }

    pub async fn activate(&self) -> ActivationReport {
        let mut report = ActivationReport::default();

        let existing = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list cache generations: {}", e);
                Vec::new()
            }
        };

        let stale: Vec<String> = existing
            .into_iter()
            .filter(|name| !self.names.is_current(name))
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            info!("Deleting stale cache generation {}", name);
            (name, self.storage.delete(name).await)
        }))
        .await;

        for (name, result) in results {
            match result {
                Ok(_) => report.deleted.push(name.clone()),
                Err(e) => {
                    warn!("Failed to delete cache generation {}: {}", name, e);
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }

        report.claimed = self.clients.claim(&self.version);
        info!(
            "Version {} active: {} stale generation(s) deleted, {} client(s) claimed",
            self.version,
            report.deleted.len(),
            report.claimed
        );
        report
    }
}
