//! HTTP transport backed by `ureq`
//!
//! `ureq` is a blocking client, so every request runs on tokio's blocking
//! pool. Redirects are followed; the response is `basic` only when the final
//! URL has the same origin as the URL that was sent.

use crate::config::Config;
use crate::error::{CachefrontError, CachefrontResult};
use crate::http::{CacheMode, Request, Response, ResponseKind, ResponseMeta};
use crate::network::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use ureq::{Agent, ResponseExt};
use url::Url;

/// Headers that describe a single connection or encoding and must not be
/// forwarded or stored.
const SKIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "host",
    "content-length",
    "accept-encoding",
    "content-encoding",
];

fn is_skipped(name: &str) -> bool {
    SKIPPED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Network transport performing real HTTP requests
#[derive(Clone)]
pub struct HttpTransport {
    agent: Agent,
    origin: Url,
    upstream: Option<Url>,
    max_body_bytes: u64,
}

impl HttpTransport {
    /// Create a transport for `origin`, optionally sending its requests to `upstream`
    pub fn new(origin: Url, upstream: Option<Url>, max_body_bytes: u64) -> Self {
        let config = Agent::config_builder().http_status_as_error(false).build();
        Self {
            agent: Agent::new_with_config(config),
            origin,
            upstream,
            max_body_bytes,
        }
    }

    /// Create a transport from the application configuration
    pub fn from_config(config: &Config) -> CachefrontResult<Self> {
        let origin = Url::parse(&config.worker.origin)
            .map_err(|e| CachefrontError::invalid_url(&config.worker.origin, e))?;
        let upstream = config
            .network
            .upstream
            .as_deref()
            .map(|u| Url::parse(u).map_err(|e| CachefrontError::invalid_url(u, e)))
            .transpose()?;

        Ok(Self::new(origin, upstream, config.network.max_body_bytes))
    }

    /// The URL actually sent on the wire for a request URL
    pub fn wire_url(&self, url: &Url) -> Url {
        let mut target = match &self.upstream {
            Some(upstream) if url.origin() == self.origin.origin() => {
                let mut target = upstream.clone();
                let base = upstream.path().trim_end_matches('/');
                target.set_path(&format!("{}{}", base, url.path()));
                target.set_query(url.query());
                target
            }
            _ => url.clone(),
        };
        target.set_fragment(None);
        target
    }
}

/// Perform one blocking request
fn send(
    agent: &Agent,
    method: &str,
    wire: &Url,
    headers: &[(String, String)],
    body: Bytes,
    cache_mode: CacheMode,
    limit: u64,
) -> CachefrontResult<Response> {
    let mut builder = ureq::http::Request::builder()
        .method(method)
        .uri(wire.as_str());

    for (name, value) in headers.iter().filter(|(name, _)| !is_skipped(name)) {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if cache_mode == CacheMode::Reload {
        builder = builder
            .header("cache-control", "no-cache")
            .header("pragma", "no-cache");
    }

    let result = if body.is_empty() {
        let request = builder
            .body(())
            .map_err(|e| CachefrontError::network(wire.as_str(), e))?;
        agent.run(request)
    } else {
        let request = builder
            .body(body.to_vec())
            .map_err(|e| CachefrontError::network(wire.as_str(), e))?;
        agent.run(request)
    };

    let mut response = result.map_err(|e| CachefrontError::network(wire.as_str(), e))?;

    let final_url = response.get_uri().to_string();
    let kind = match Url::parse(&final_url) {
        Ok(url) if url.origin() == wire.origin() => ResponseKind::Basic,
        _ => ResponseKind::Opaque,
    };

    let status = response.status().as_u16();
    let response_headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter(|(name, _)| !is_skipped(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = response
        .body_mut()
        .with_config()
        .limit(limit)
        .read_to_vec()
        .map_err(|e| match e {
            ureq::Error::BodyExceedsLimit(_) => CachefrontError::ResponseTooLarge {
                url: wire.to_string(),
                limit,
            },
            other => CachefrontError::network(wire.as_str(), other),
        })?;

    debug!("{} {} -> {} ({})", method, wire, status, kind);

    Ok(Response::from_parts(
        ResponseMeta {
            status,
            headers: response_headers,
            kind,
            url: Some(final_url),
        },
        Bytes::from(body),
    ))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> CachefrontResult<Response> {
        let agent = self.agent.clone();
        let wire = self.wire_url(request.url());
        let method = request.method().to_string();
        let headers = request.headers.clone();
        let body = request.body.clone();
        let cache_mode = request.cache_mode;
        let limit = self.max_body_bytes;

        tokio::task::spawn_blocking(move || {
            send(&agent, &method, &wire, &headers, body, cache_mode, limit)
        })
        .await
        .map_err(|e| CachefrontError::Internal(format!("transport task failed: {}", e)))?
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}
