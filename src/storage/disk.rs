//! Filesystem-backed cache storage
//!
//! Layout:
//!
//! ```text
//! <root>/<generation>/generation.json     name + creation time
//! <root>/<generation>/<sha256(key)>.entry JSON header line, then raw body
//! ```
//!
//! Entries are written to a temporary file and renamed into place, so a
//! reader sees either the old or the new entry, never a mix.

use crate::error::{CachefrontError, CachefrontResult};
use crate::generation::validate_name;
use crate::http::{RequestKey, Response, ResponseMeta};
use crate::storage::{Cache, CacheStorage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

const GENERATION_MARKER: &str = "generation.json";
const ENTRY_EXTENSION: &str = "entry";

/// Marker file identifying a directory as a cache generation
#[derive(Debug, Serialize, Deserialize)]
struct GenerationMarker {
    name: String,
    created_at: DateTime<Utc>,
}

/// First line of an entry file
#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    key: RequestKey,
    meta: ResponseMeta,
    stored_at: DateTime<Utc>,
}

/// File name for a key: content-addressed so any URL maps to a safe name
fn entry_file_name(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b" ");
    hasher.update(key.url.as_bytes());
    format!("{}.{}", hex::encode(hasher.finalize()), ENTRY_EXTENSION)
}

/// Write `contents` next to `path` and rename it into place
async fn write_atomic(path: &Path, contents: &[u8]) -> CachefrontResult<()> {
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    fs::write(&tmp, contents)
        .await
        .map_err(|e| CachefrontError::io(format!("writing {}", tmp.display()), e))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(CachefrontError::io(format!("renaming into {}", path.display()), e));
    }
    Ok(())
}

/// One generation directory
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    async fn read_entry(path: &Path) -> CachefrontResult<Option<(EntryHeader, Bytes)>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CachefrontError::io(format!("reading {}", path.display()), e)),
        };

        let corrupt = |reason: String| CachefrontError::CacheEntryCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let split = raw
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| corrupt("missing header line".to_string()))?;
        let header: EntryHeader =
            serde_json::from_slice(&raw[..split]).map_err(|e| corrupt(e.to_string()))?;
        let body = Bytes::copy_from_slice(&raw[split + 1..]);

        Ok(Some((header, body)))
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn match_key(&self, key: &RequestKey) -> CachefrontResult<Option<Response>> {
        let path = self.dir.join(entry_file_name(key));
        match Self::read_entry(&path).await? {
            // A hash collision would surface here as a different key.
            Some((header, body)) if header.key == *key => {
                Ok(Some(Response::from_parts(header.meta, body)))
            }
            _ => Ok(None),
        }
    }

    async fn put(&self, key: RequestKey, response: Response) -> CachefrontResult<()> {
        let path = self.dir.join(entry_file_name(&key));
        let (meta, body) = response.into_parts();
        let header = EntryHeader {
            key,
            meta,
            stored_at: Utc::now(),
        };

        // serde_json escapes newlines inside strings, so the header is one line.
        let mut contents = serde_json::to_vec(&header)?;
        contents.push(b'\n');
        contents.extend_from_slice(&body);

        write_atomic(&path, &contents).await?;
        debug!("Stored {} in {}", header.key, self.dir.display());
        Ok(())
    }

    async fn keys(&self) -> CachefrontResult<Vec<RequestKey>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CachefrontError::io(format!("reading {}", self.dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CachefrontError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                match Self::read_entry(&path).await {
                    Ok(Some((header, _))) => keys.push(header.key),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping unreadable cache entry: {}", e),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &RequestKey) -> CachefrontResult<bool> {
        let path = self.dir.join(entry_file_name(key));
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CachefrontError::io(format!("deleting {}", path.display()), e)),
        }
    }
}

/// Storage rooted at a directory
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_marker(dir: &Path) -> Option<GenerationMarker> {
        let content = fs::read(dir.join(GENERATION_MARKER)).await.ok()?;
        serde_json::from_slice(&content).ok()
    }

    fn generation_dir(&self, name: &str) -> CachefrontResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> CachefrontResult<Arc<dyn Cache>> {
        let dir = self.generation_dir(name)?;

        if Self::read_marker(&dir).await.is_none() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| CachefrontError::io(format!("creating {}", dir.display()), e))?;

            let marker = GenerationMarker {
                name: name.to_string(),
                created_at: Utc::now(),
            };
            write_atomic(&dir.join(GENERATION_MARKER), &serde_json::to_vec(&marker)?).await?;
            debug!("Created cache generation {}", name);
        }

        Ok(Arc::new(DiskCache { dir }))
    }

    async fn get(&self, name: &str) -> CachefrontResult<Option<Arc<dyn Cache>>> {
        let dir = self.generation_dir(name)?;
        match Self::read_marker(&dir).await {
            Some(_) => Ok(Some(Arc::new(DiskCache { dir }))),
            None => Ok(None),
        }
    }

    async fn keys(&self) -> CachefrontResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(CachefrontError::io(
                    format!("reading {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut generations = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CachefrontError::io("reading cache generation", e))?
        {
            if let Some(marker) = Self::read_marker(&entry.path()).await {
                generations.push(marker);
            }
        }

        generations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(generations.into_iter().map(|m| m.name).collect())
    }

    async fn delete(&self, name: &str) -> CachefrontResult<bool> {
        let dir = self.generation_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CachefrontError::io(format!("deleting {}", dir.display()), e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseKind;
    use tempfile::TempDir;
    use url::Url;

    fn create_test_storage() -> (DiskStorage, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = DiskStorage::new(temp_dir.path().join("caches"));
        (storage, temp_dir)
    }

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn keys_empty_when_root_missing() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_then_match_preserves_response() {
        let (storage, _temp) = create_test_storage();
        let cache = storage.open("static-v1").await.unwrap();

        let body: Vec<u8> = b"line one\nline two\n\x00binary".to_vec();
        let response = Response::new(200, ResponseKind::Basic, body.clone())
            .with_header("content-type", "text/html")
            .with_url("https://app.test/index.html");
        cache.put(key("/index.html"), response).await.unwrap();

        let stored = cache.match_key(&key("/index.html")).await.unwrap().unwrap();
        assert_eq!(stored.status(), 200);
        assert_eq!(stored.kind(), ResponseKind::Basic);
        assert_eq!(stored.meta().url.as_deref(), Some("https://app.test/index.html"));
        assert_eq!(stored.into_body().to_vec(), body);
    }

    #[tokio::test]
    async fn delete_removes_single_entry() {
        let (storage, _temp) = create_test_storage();
        let cache = storage.open("static-v1").await.unwrap();
        for path in ["/a", "/b"] {
            cache
                .put(key(path), Response::new(200, ResponseKind::Basic, "x"))
                .await
                .unwrap();
        }

        assert!(cache.delete(&key("/a")).await.unwrap());
        assert!(!cache.delete(&key("/a")).await.unwrap());
        assert_eq!(cache.keys().await.unwrap(), vec![key("/b")]);
    }

    #[tokio::test]
    async fn match_misses_other_keys() {
        let (storage, _temp) = create_test_storage();
        let cache = storage.open("static-v1").await.unwrap();
        cache
            .put(key("/a"), Response::new(200, ResponseKind::Basic, "a"))
            .await
            .unwrap();

        assert!(cache.match_key(&key("/b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generations_survive_reopen() {
        let (storage, temp) = create_test_storage();
        let cache = storage.open("dynamic-v1").await.unwrap();
        cache
            .put(key("/page"), Response::new(200, ResponseKind::Basic, "page"))
            .await
            .unwrap();

        let reopened = DiskStorage::new(temp.path().join("caches"));
        assert_eq!(reopened.keys().await.unwrap(), vec!["dynamic-v1"]);
        assert!(reopened.match_any(&key("/page")).await.unwrap().is_some());
        assert_eq!(
            reopened
                .get("dynamic-v1")
                .await
                .unwrap()
                .unwrap()
                .keys()
                .await
                .unwrap(),
            vec![key("/page")]
        );
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let (storage, _temp) = create_test_storage();
        storage.open("old-v0").await.unwrap();
        storage.open("static-v1").await.unwrap();

        assert!(storage.delete("old-v0").await.unwrap());
        assert!(!storage.delete("old-v0").await.unwrap());
        assert!(!storage.root().join("old-v0").exists());
        assert_eq!(storage.keys().await.unwrap(), vec!["static-v1"]);
    }

    #[tokio::test]
    async fn stray_directories_are_not_generations() {
        let (storage, _temp) = create_test_storage();
        std::fs::create_dir_all(storage.root().join("not-a-cache")).unwrap();
        storage.open("static-v1").await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["static-v1"]);
        assert!(storage.get("not-a-cache").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_reported() {
        let (storage, _temp) = create_test_storage();
        let cache = storage.open("static-v1").await.unwrap();
        let path = storage.root().join("static-v1").join(entry_file_name(&key("/x")));
        std::fs::write(&path, b"no header here").unwrap();

        let err = cache.match_key(&key("/x")).await.unwrap_err();
        assert!(matches!(err, CachefrontError::CacheEntryCorrupt { .. }));
    }
}
