//! Fetch-time policy: cache first, then network, then offline fallback
//!
//! Only same-origin GET requests are handled; everything else is declined and
//! left to the host's default network path. Successful same-origin network
//! responses are written to the dynamic generation behind the caller's back.

use crate::error::{CachefrontError, CachefrontResult};
use crate::http::{Request, RequestKey, Response};
use crate::network::Transport;
use crate::storage::CacheStorage;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Where an intercepted response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Found in one of the cache generations, no network access
    Cache,
    /// Fetched from the network
    Network,
    /// Network failed; the cached offline document was served instead
    OfflineFallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::OfflineFallback => write!(f, "offline-fallback"),
        }
    }
}

/// A response chosen by the interceptor
#[derive(Debug)]
pub struct Responded {
    pub response: Response,
    pub source: ResponseSource,
    write_behind: Option<JoinHandle<()>>,
}

impl Responded {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self {
            response,
            source,
            write_behind: None,
        }
    }

    /// Whether a dynamic-cache write was started for this response
    pub fn has_pending_write(&self) -> bool {
        self.write_behind.is_some()
    }

    /// Wait for the background cache write, if any, to finish
    pub async fn settle(&mut self) {
        if let Some(handle) = self.write_behind.take() {
            if let Err(e) = handle.await {
                warn!("Cache write task failed: {}", e);
            }
        }
    }
}

/// Decision for one fetch event
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself
    Declined,
    /// Intercepted and answered
    Responded(Responded),
}

impl FetchOutcome {
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }
}

/// Per-version request policy
pub struct Interceptor {
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    origin: Url,
    dynamic_generation: String,
    offline_fallback: Url,
}

impl Interceptor {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        transport: Arc<dyn Transport>,
        origin: Url,
        dynamic_generation: impl Into<String>,
        offline_fallback: Url,
    ) -> Self {
        Self {
            storage,
            transport,
            origin,
            dynamic_generation: dynamic_generation.into(),
            offline_fallback,
        }
    }

    /// Whether this policy handles the request at all
    pub fn is_eligible(&self, request: &Request) -> bool {
        request.is_get() && request.is_same_origin(&self.origin)
    }

    pub async fn handle(&self, request: &Request) -> CachefrontResult<FetchOutcome> {
        if !self.is_eligible(request) {
            return Ok(FetchOutcome::Declined);
        }

        let key = request.key();
        match self.storage.match_any(&key).await {
            Ok(Some(cached)) => {
                debug!("Served from cache: {}", request.url());
                return Ok(FetchOutcome::Responded(Responded::new(
                    cached,
                    ResponseSource::Cache,
                )));
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup for {} failed, treating as miss: {}", key, e),
        }

        let response = match self.transport.fetch(request).await {
            Ok(response) => response,
            Err(e) => return self.offline_fallback(request, e).await,
        };

        if !response.is_cacheable() {
            debug!(
                "Served from network without caching: {} ({} {})",
                request.url(),
                response.status(),
                response.kind()
            );
            return Ok(FetchOutcome::Responded(Responded::new(
                response,
                ResponseSource::Network,
            )));
        }

        let (response, copy) = response.tee();
        let handle = self.store_behind(key, copy);
        debug!("Served from network and caching: {}", request.url());

        Ok(FetchOutcome::Responded(Responded {
            response,
            source: ResponseSource::Network,
            write_behind: Some(handle),
        }))
    }

    /// Persist a copy into the dynamic generation without holding up the caller
    fn store_behind(&self, key: RequestKey, copy: Response) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let generation = self.dynamic_generation.clone();

        tokio::spawn(async move {
            let result: CachefrontResult<()> = async {
                let cache = storage.open(&generation).await?;
                cache.put(key.clone(), copy).await
            }
            .await;

            match result {
                Ok(()) => debug!("Cached {} in {}", key, generation),
                Err(e) => warn!("Failed to cache {} in {}: {}", key, generation, e),
            }
        })
    }

    async fn offline_fallback(
        &self,
        request: &Request,
        error: CachefrontError,
    ) -> CachefrontResult<FetchOutcome> {
        warn!("Network error for {}: {}", request.url(), error);

        let missing = || CachefrontError::OfflineFallbackMissing {
            url: request.url().to_string(),
            fallback: self.offline_fallback.to_string(),
        };

        match self
            .storage
            .match_any(&RequestKey::get(&self.offline_fallback))
            .await
        {
            Ok(Some(fallback)) => {
                debug!("Served offline fallback for {}", request.url());
                Ok(FetchOutcome::Responded(Responded::new(
                    fallback,
                    ResponseSource::OfflineFallback,
                )))
            }
            Ok(None) => Err(missing()),
            Err(e) => {
                warn!("Offline fallback lookup failed: {}", e);
                Err(missing())
            }
        }
    }
}
