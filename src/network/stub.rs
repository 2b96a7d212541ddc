//! Scripted transport for tests and dry runs
//!
//! Routes are keyed by full URL. Unknown URLs answer `404` (same-origin).
//! `set_offline(true)` makes every fetch fail the way a dropped network does.

use crate::error::{CachefrontError, CachefrontResult};
use crate::http::{Request, Response, ResponseKind};
use crate::network::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StubRoute {
    status: u16,
    kind: ResponseKind,
    body: Bytes,
}

/// Transport that answers from a fixed route table
#[derive(Debug, Default)]
pub struct StubTransport {
    routes: Mutex<HashMap<String, StubRoute>>,
    offline: AtomicBool,
    requests: Mutex<Vec<Request>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, StubRoute>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self) -> MutexGuard<'_, Vec<Request>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer `url` with a same-origin response
    pub fn route(&self, url: &str, status: u16, body: impl Into<Bytes>) -> &Self {
        self.route_with_kind(url, status, ResponseKind::Basic, body)
    }

    /// Answer `url` with an explicit response kind
    pub fn route_with_kind(
        &self,
        url: &str,
        status: u16,
        kind: ResponseKind,
        body: impl Into<Bytes>,
    ) -> &Self {
        self.routes().insert(
            url.to_string(),
            StubRoute {
                status,
                kind,
                body: body.into(),
            },
        );
        self
    }

    /// Simulate a total network outage
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches attempted, including failed ones
    pub fn call_count(&self) -> usize {
        self.log().len()
    }

    /// Number of fetches attempted for one URL
    pub fn calls_to(&self, url: &str) -> usize {
        self.log().iter().filter(|r| r.url().as_str() == url).count()
    }

    /// Copies of every request seen, in order
    pub fn requests(&self) -> Vec<Request> {
        self.log().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, request: &Request) -> CachefrontResult<Response> {
        self.log().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(CachefrontError::network(
                request.url().as_str(),
                "network unreachable",
            ));
        }

        let route = self.routes().get(request.url().as_str()).cloned();
        let response = match route {
            Some(route) => Response::new(route.status, route.kind, route.body),
            None => Response::new(404, ResponseKind::Basic, "not found"),
        };
        Ok(response.with_url(request.url().as_str()))
    }

    fn transport_name(&self) -> &'static str {
        "stub"
    }
}
