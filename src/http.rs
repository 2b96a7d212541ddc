//! Request and response model shared by storage, transport and the worker
//!
//! A `Response` body can be read once. Code that needs to both return and
//! persist a response must call [`Response::tee`] to get two copies.

use crate::error::{CachefrontError, CachefrontResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How the transport should treat intermediate HTTP caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Normal request
    #[default]
    Default,
    /// Revalidate with the origin, ignoring any intermediate cached copy
    Reload,
}

/// An outgoing or intercepted request
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub cache_mode: CacheMode,
}

impl Request {
    /// Create a request; the method is normalized to upper case
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            cache_mode: CacheMode::Default,
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Parse `url` and create a GET request
    pub fn get_str(url: &str) -> CachefrontResult<Self> {
        let parsed = Url::parse(url).map_err(|e| CachefrontError::invalid_url(url, e))?;
        Ok(Self::get(parsed))
    }

    /// Set the cache mode
    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Whether the request targets `origin`
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    /// Cache key for this request
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }

    /// First value of a header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Normalized identity of a request inside a cache generation
///
/// Method and URL only; the fragment never reaches the network so it is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Key for a GET of `url`
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Where a response came from, relative to the request's origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response readable via CORS
    Cors,
    /// Cross-origin response whose contents must be treated as opaque
    Opaque,
    /// Network error placeholder
    Error,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Cors => write!(f, "cors"),
            Self::Opaque => write!(f, "opaque"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Everything about a response except its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub kind: ResponseKind,
    /// Final URL after redirects, if known
    pub url: Option<String>,
}

/// A response whose body can be consumed once
#[derive(Debug)]
pub struct Response {
    meta: ResponseMeta,
    body: Bytes,
}

impl Response {
    pub fn new(status: u16, kind: ResponseKind, body: impl Into<Bytes>) -> Self {
        Self {
            meta: ResponseMeta {
                status,
                headers: Vec::new(),
                kind,
                url: None,
            },
            body: body.into(),
        }
    }

    pub fn from_parts(meta: ResponseMeta, body: Bytes) -> Self {
        Self { meta, body }
    }

    pub fn into_parts(self) -> (ResponseMeta, Bytes) {
        (self.meta, self.body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.meta.url = Some(url.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.meta.status
    }

    pub fn kind(&self) -> ResponseKind {
        self.meta.kind
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.meta.headers
    }

    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    /// Status in the 200-299 range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.meta.status)
    }

    /// Only complete same-origin responses are written to the dynamic generation.
    pub fn is_cacheable(&self) -> bool {
        self.meta.status == 200 && self.meta.kind == ResponseKind::Basic
    }

    /// Consume the response and take its body
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Split into two independently readable responses
    pub fn tee(self) -> (Response, Response) {
        let copy = Response {
            meta: self.meta.clone(),
            body: self.body.clone(),
        };
        (self, copy)
    }
}
