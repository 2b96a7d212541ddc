//! Open client pages and the version controlling each one

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Registry of known clients
#[derive(Debug, Default)]
pub struct ClientSet {
    clients: Mutex<HashMap<String, Option<String>>>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a client; a newly seen client is controlled by `active_version`.
    ///
    /// Returns the version currently controlling the client.
    pub fn register(&self, id: &str, active_version: Option<&str>) -> Option<String> {
        self.clients()
            .entry(id.to_string())
            .or_insert_with(|| active_version.map(str::to_string))
            .clone()
    }

    /// Make `version` the controller of every known client; returns how many
    pub fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients();
        for controller in clients.values_mut() {
            *controller = Some(version.to_string());
        }
        clients.len()
    }

    /// Version controlling a client, if any
    pub fn controller(&self, id: &str) -> Option<String> {
        self.clients().get(id).cloned().flatten()
    }

    /// Number of clients controlled by `version`
    pub fn controlled_by(&self, version: &str) -> usize {
        self.clients()
            .values()
            .filter(|c| c.as_deref() == Some(version))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
