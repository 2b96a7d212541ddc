//! In-memory cache storage

use crate::error::CachefrontResult;
use crate::generation::validate_name;
use crate::http::{RequestKey, Response, ResponseMeta};
use crate::storage::{Cache, CacheStorage};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A generation held in memory
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<RequestKey, (ResponseMeta, Bytes)>>,
}

impl MemoryCache {
    fn entries(&self) -> MutexGuard<'_, BTreeMap<RequestKey, (ResponseMeta, Bytes)>> {
        // A poisoned map still holds whole entries; every insert is a single call.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn match_key(&self, key: &RequestKey) -> CachefrontResult<Option<Response>> {
        Ok(self
            .entries()
            .get(key)
            .map(|(meta, body)| Response::from_parts(meta.clone(), body.clone())))
    }

    async fn put(&self, key: RequestKey, response: Response) -> CachefrontResult<()> {
        let (meta, body) = response.into_parts();
        self.entries().insert(key, (meta, body));
        Ok(())
    }

    async fn keys(&self) -> CachefrontResult<Vec<RequestKey>> {
        Ok(self.entries().keys().cloned().collect())
    }

    async fn delete(&self, key: &RequestKey) -> CachefrontResult<bool> {
        Ok(self.entries().remove(key).is_some())
    }
}

/// Process-local storage; generations are kept in creation order
#[derive(Debug, Default)]
pub struct MemoryStorage {
    generations: Mutex<Vec<(String, Arc<MemoryCache>)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn generations(&self) -> MutexGuard<'_, Vec<(String, Arc<MemoryCache>)>> {
        self.generations.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Typed access to a generation, for inspection in tests
    pub fn generation(&self, name: &str) -> Option<Arc<MemoryCache>> {
        self.generations()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cache)| Arc::clone(cache))
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> CachefrontResult<Arc<dyn Cache>> {
        validate_name(name)?;

        let mut generations = self.generations();
        if let Some((_, cache)) = generations.iter().find(|(n, _)| n == name) {
            return Ok(Arc::clone(cache) as Arc<dyn Cache>);
        }

        let cache = Arc::new(MemoryCache::default());
        generations.push((name.to_string(), Arc::clone(&cache)));
        Ok(cache)
    }

    async fn get(&self, name: &str) -> CachefrontResult<Option<Arc<dyn Cache>>> {
        Ok(self.generation(name).map(|cache| cache as Arc<dyn Cache>))
    }

    async fn keys(&self) -> CachefrontResult<Vec<String>> {
        Ok(self.generations().iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, name: &str) -> CachefrontResult<bool> {
        let mut generations = self.generations();
        let before = generations.len();
        generations.retain(|(n, _)| n != name);
        Ok(generations.len() != before)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseKind;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn open_creates_once_and_preserves_order() {
        let storage = MemoryStorage::new();
        storage.open("b").await.unwrap();
        storage.open("a").await.unwrap();
        storage.open("b").await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn get_does_not_create() {
        let storage = MemoryStorage::new();
        assert!(storage.get("missing").await.unwrap().is_none());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_replaces_whole_entry() {
        let storage = MemoryStorage::new();
        let cache = storage.open("gen").await.unwrap();

        cache
            .put(key("/a"), Response::new(200, ResponseKind::Basic, "first"))
            .await
            .unwrap();
        cache
            .put(
                key("/a"),
                Response::new(200, ResponseKind::Basic, "second").with_header("etag", "2"),
            )
            .await
            .unwrap();

        let stored = cache.match_key(&key("/a")).await.unwrap().unwrap();
        assert_eq!(stored.headers(), &[("etag".to_string(), "2".to_string())]);
        assert_eq!(&stored.into_body()[..], b"second");
        assert_eq!(cache.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_generation_and_entries() {
        let storage = MemoryStorage::new();
        let cache = storage.open("old").await.unwrap();
        cache
            .put(key("/a"), Response::new(200, ResponseKind::Basic, "x"))
            .await
            .unwrap();

        assert!(storage.delete("old").await.unwrap());
        assert!(!storage.delete("old").await.unwrap());
        assert!(storage.match_any(&key("/a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_rejects_invalid_name() {
        let storage = MemoryStorage::new();
        assert!(storage.open("../escape").await.is_err());
    }
}
