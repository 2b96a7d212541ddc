//! Install phase: pre-warm the static generation
//!
//! All manifest assets are fetched concurrently with `CacheMode::Reload`.
//! The batch is all-or-nothing: entries are written only after every fetch
//! returned an OK response, and a failed write removes the entries this batch
//! already stored.

use crate::error::{CachefrontError, CachefrontResult};
use crate::http::{CacheMode, Request, RequestKey, Response};
use crate::network::Transport;
use crate::storage::{Cache, CacheStorage};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Generation the manifest was written to
    pub generation: String,
    /// Manifest URLs now stored, in manifest order
    pub stored: Vec<String>,
}

/// Populates one static generation from a manifest
pub struct Installer {
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    generation: String,
    manifest: Vec<Url>,
}

impl Installer {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        transport: Arc<dyn Transport>,
        generation: impl Into<String>,
        manifest: Vec<Url>,
    ) -> Self {
        Self {
            storage,
            transport,
            generation: generation.into(),
            manifest,
        }
    }

    /// Fetch every manifest asset and store the batch in the static generation
    pub async fn install(&self) -> CachefrontResult<InstallReport> {
        info!(
            "Caching {} static assets into {}",
            self.manifest.len(),
            self.generation
        );
        let cache = self.storage.open(&self.generation).await?;

        let responses =
            try_join_all(self.manifest.iter().map(|url| self.fetch_asset(url))).await?;

        let mut written: Vec<RequestKey> = Vec::with_capacity(responses.len());
        for (url, response) in self.manifest.iter().zip(responses) {
            let key = RequestKey::get(url);
            if let Err(e) = cache.put(key.clone(), response).await {
                self.roll_back(cache.as_ref(), &written).await;
                return Err(e);
            }
            written.push(key);
        }
        let stored: Vec<String> = self.manifest.iter().map(|url| url.to_string()).collect();

        info!("Cached {} static assets", stored.len());
        Ok(InstallReport {
            generation: self.generation.clone(),
            stored,
        })
    }

    /// Remove the entries a failed batch already wrote
    async fn roll_back(&self, cache: &dyn Cache, written: &[RequestKey]) {
        for key in written {
            if let Err(e) = cache.delete(key).await {
                warn!("Failed to roll back {} in {}: {}", key, self.generation, e);
            }
        }
    }

    async fn fetch_asset(&self, url: &Url) -> CachefrontResult<Response> {
        let request = Request::get(url.clone()).with_cache_mode(CacheMode::Reload);

        let response = self
            .transport
            .fetch(&request)
            .await
            .map_err(|e| CachefrontError::InstallFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_ok() {
            return Err(CachefrontError::InstallFailed {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        debug!("Fetched static asset {}", url);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StubTransport;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;

    /// Memory storage whose caches refuse to store one URL
    struct FailingPut {
        inner: MemoryStorage,
        fail_on: String,
    }

    struct FailingPutCache {
        inner: Arc<dyn Cache>,
        fail_on: String,
    }

    #[async_trait]
    impl Cache for FailingPutCache {
        async fn match_key(&self, key: &RequestKey) -> CachefrontResult<Option<Response>> {
            self.inner.match_key(key).await
        }

        async fn put(&self, key: RequestKey, response: Response) -> CachefrontResult<()> {
            if key.url == self.fail_on {
                return Err(CachefrontError::Storage("disk full".to_string()));
            }
            self.inner.put(key, response).await
        }

        async fn keys(&self) -> CachefrontResult<Vec<RequestKey>> {
            self.inner.keys().await
        }

        async fn delete(&self, key: &RequestKey) -> CachefrontResult<bool> {
            self.inner.delete(key).await
        }
    }

    #[async_trait]
    impl CacheStorage for FailingPut {
        async fn open(&self, name: &str) -> CachefrontResult<Arc<dyn Cache>> {
            Ok(Arc::new(FailingPutCache {
                inner: self.inner.open(name).await?,
                fail_on: self.fail_on.clone(),
            }))
        }

        async fn get(&self, name: &str) -> CachefrontResult<Option<Arc<dyn Cache>>> {
            self.inner.get(name).await
        }

        async fn keys(&self) -> CachefrontResult<Vec<String>> {
            self.inner.keys().await
        }

        async fn delete(&self, name: &str) -> CachefrontResult<bool> {
            self.inner.delete(name).await
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    const ORIGIN: &str = "https://app.test";

    fn manifest(paths: &[&str]) -> Vec<Url> {
        let origin = Url::parse(ORIGIN).unwrap();
        paths.iter().map(|p| origin.join(p).unwrap()).collect()
    }

    fn setup() -> (Arc<MemoryStorage>, Arc<StubTransport>) {
        (Arc::new(MemoryStorage::new()), Arc::new(StubTransport::new()))
    }

    #[tokio::test]
    async fn stores_every_manifest_asset() {
        let (storage, transport) = setup();
        transport
            .route("https://app.test/", 200, "root")
            .route("https://app.test/index.html", 200, "index")
            .route("https://app.test/manifest.json", 200, "{}");

        let installer = Installer::new(
            storage.clone(),
            transport.clone(),
            "static-v1",
            manifest(&["/", "/index.html", "/manifest.json"]),
        );
        let report = installer.install().await.unwrap();

        assert_eq!(report.generation, "static-v1");
        assert_eq!(report.stored.len(), 3);
        assert_eq!(storage.generation("static-v1").unwrap().len(), 3);

        let calls_before = transport.call_count();
        let key = RequestKey::get(&Url::parse("https://app.test/manifest.json").unwrap());
        let stored = storage.match_any(&key).await.unwrap().unwrap();
        assert_eq!(&stored.into_body()[..], b"{}");
        assert_eq!(transport.call_count(), calls_before);
    }

    #[tokio::test]
    async fn fetches_bypass_intermediate_caches() {
        let (storage, transport) = setup();
        transport.route("https://app.test/", 200, "root");

        Installer::new(storage, transport.clone(), "static-v1", manifest(&["/"]))
            .install()
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].cache_mode, CacheMode::Reload);
    }

    #[tokio::test]
    async fn one_bad_status_fails_the_batch() {
        let (storage, transport) = setup();
        transport.route("https://app.test/", 200, "root");
        // /missing.png falls through to the stub's 404

        let installer = Installer::new(
            storage.clone(),
            transport,
            "static-v1",
            manifest(&["/", "/missing.png"]),
        );
        let err = installer.install().await.unwrap_err();

        assert!(matches!(
            err,
            CachefrontError::InstallFailed { ref url, .. } if url.ends_with("/missing.png")
        ));
        assert!(storage.generation("static-v1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_rolls_back_the_batch() {
        let transport = Arc::new(StubTransport::new());
        transport
            .route("https://app.test/", 200, "root")
            .route("https://app.test/index.html", 200, "index")
            .route("https://app.test/app.css", 200, "css");
        let storage = Arc::new(FailingPut {
            inner: MemoryStorage::new(),
            fail_on: "https://app.test/app.css".to_string(),
        });

        let installer = Installer::new(
            storage.clone(),
            transport,
            "static-v1",
            manifest(&["/", "/index.html", "/app.css"]),
        );
        let err = installer.install().await.unwrap_err();

        assert!(matches!(err, CachefrontError::Storage(_)));
        assert!(storage.inner.generation("static-v1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn network_failure_fails_the_batch() {
        let (storage, transport) = setup();
        transport.set_offline(true);

        let installer =
            Installer::new(storage.clone(), transport, "static-v1", manifest(&["/"]));
        assert!(installer.install().await.is_err());
        assert!(storage.generation("static-v1").unwrap().is_empty());
    }
}
