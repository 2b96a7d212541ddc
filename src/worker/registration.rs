//! Registration: which version is active, which is waiting
//!
//! Phase ordering lives here. A worker is installed before it can activate,
//! and its activation (cleanup, then client claim) finishes before the next
//! activation starts.

use crate::error::CachefrontResult;
use crate::http::Request;
use crate::worker::{
    ActivationReport, ClientMessage, ClientSet, FetchOutcome, Worker, WorkerState,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

type Slot = Mutex<Option<Arc<Worker>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Arc<Worker>>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Holds the active and waiting workers for one origin
#[derive(Debug, Default)]
pub struct Registration {
    active: Slot,
    waiting: Slot,
    clients: Arc<ClientSet>,
    activation: tokio::sync::Mutex<()>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clients(&self) -> &Arc<ClientSet> {
        &self.clients
    }

    pub fn active(&self) -> Option<Arc<Worker>> {
        lock(&self.active).clone()
    }

    pub fn waiting(&self) -> Option<Arc<Worker>> {
        lock(&self.waiting).clone()
    }

    /// Install a new version, then activate it or leave it waiting
    ///
    /// An install failure is logged and swallowed: the version still proceeds,
    /// possibly with an incomplete static generation.
    pub async fn register(&self, worker: Arc<Worker>) -> WorkerState {
        if let Err(e) = worker.install().await {
            warn!("Static asset caching failed for {}: {}", worker.version(), e);
        }

        let has_active = self.active().is_some();
        if !has_active || worker.skip_waiting_requested() {
            // An older waiting version must never be promoted over this one.
            let stale = lock(&self.waiting).take();
            if let Some(stale) = stale {
                if !Arc::ptr_eq(&stale, &worker) {
                    stale.set_state(WorkerState::Redundant);
                }
            }
            self.activate(worker).await;
            return WorkerState::Activated;
        }

        info!("Version {} installed, waiting to activate", worker.version());
        if let Some(previous) = lock(&self.waiting).replace(worker) {
            previous.set_state(WorkerState::Redundant);
        }
        WorkerState::Installed
    }

    /// Deliver a page message
    ///
    /// Returns the activation report when the message promoted a waiting worker.
    pub async fn post_message(&self, message: ClientMessage) -> Option<ActivationReport> {
        match message {
            ClientMessage::SkipWaiting => {
                let waiting = lock(&self.waiting).take();
                match waiting {
                    Some(worker) => {
                        worker.skip_waiting();
                        Some(self.activate(worker).await)
                    }
                    None => {
                        debug!("SKIP_WAITING received with no waiting version");
                        None
                    }
                }
            }
            ClientMessage::Unknown => {
                debug!("Ignoring unknown client message");
                None
            }
        }
    }

    /// Promote a worker to active and run its activate phase
    async fn activate(&self, worker: Arc<Worker>) -> ActivationReport {
        let _guard = self.activation.lock().await;

        let previous = lock(&self.active).replace(Arc::clone(&worker));
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous, &worker) {
                previous.set_state(WorkerState::Redundant);
            }
        }

        worker.activate(Arc::clone(&self.clients)).await
    }

    /// Record a page and return the version that controls it
    pub fn register_client(&self, id: &str) -> Option<String> {
        let active = self.active();
        self.clients
            .register(id, active.as_ref().map(|w| w.version()))
    }

    /// Fetch event: routed to the active worker, declined when there is none
    pub async fn fetch(&self, request: &Request) -> CachefrontResult<FetchOutcome> {
        match self.active() {
            Some(worker) => worker.fetch(request).await,
            None => Ok(FetchOutcome::Declined),
        }
    }
}
