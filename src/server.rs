//! HTTP front end
//!
//! Every incoming request becomes a fetch event for the active worker.
//! Declined requests are forwarded untouched through the transport.
//! `POST /__cachefront/message` delivers page messages (e.g. `SKIP_WAITING`).

use crate::error::{CachefrontError, CachefrontResult};
use crate::http::{Request, Response};
use crate::network::Transport;
use crate::worker::{ClientMessage, FetchOutcome, Registration};
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

/// Path reserved for page messages; never intercepted
pub const MESSAGE_PATH: &str = "/__cachefront/message";

/// Header carrying a stable id for the page making the request
pub const CLIENT_HEADER: &str = "x-cachefront-client";

/// Shared state for all handlers
pub struct ServerState {
    pub registration: Arc<Registration>,
    pub transport: Arc<dyn Transport>,
    pub origin: Url,
    pub max_body_bytes: usize,
}

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(MESSAGE_PATH, post(post_message))
        .fallback(intercept)
        .with_state(state)
}

/// Serve on `listen` until Ctrl-C
pub async fn serve(listen: &str, state: Arc<ServerState>) -> CachefrontResult<()> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| CachefrontError::io(format!("binding {}", listen), e))?;
    info!("Listening on {}", listen);
    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> CachefrontResult<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CachefrontError::Server(e.to_string()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn post_message(
    State(state): State<Arc<ServerState>>,
    Json(message): Json<ClientMessage>,
) -> impl IntoResponse {
    debug!("Client message: {:?}", message);
    let activated = state.registration.post_message(message).await.is_some();
    let version = state
        .registration
        .active()
        .map(|w| w.version().to_string());

    Json(json!({ "activated": activated, "version": version }))
}

async fn intercept(
    State(state): State<Arc<ServerState>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let request = match to_request(&state, request).await {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    if let Some(id) = request.header(CLIENT_HEADER) {
        state.registration.register_client(id);
    }

    match state.registration.fetch(&request).await {
        // Dropping `Responded` detaches any pending cache write.
        Ok(FetchOutcome::Responded(responded)) => into_http(responded.response),
        Ok(FetchOutcome::Declined) => match state.transport.fetch(&request).await {
            Ok(response) => into_http(response),
            Err(e) if e.is_network() => error_response(StatusCode::BAD_GATEWAY, &e),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
        },
        Err(e @ CachefrontError::OfflineFallbackMissing { .. }) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// Reconstruct the absolute URL the page asked for
///
/// Absolute-form URIs (forward proxy use) are taken as-is; origin-form URIs
/// always belong to the configured origin, whatever `Host` says.
pub fn request_url(origin: &Url, uri: &Uri) -> CachefrontResult<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        let raw = uri.to_string();
        return Url::parse(&raw).map_err(|e| CachefrontError::invalid_url(raw, e));
    }

    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}

/// Refuse to start when origin requests would be sent back to this listener
///
/// `target` is where the transport sends the origin's requests: the upstream
/// when one is configured, the origin itself otherwise.
pub fn check_forwarding(target: &Url, listen: &str) -> CachefrontResult<()> {
    let Some((listen_host, listen_port)) = listen.rsplit_once(':') else {
        return Ok(());
    };
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let Some(port) = target.port_or_known_default() else {
        return Ok(());
    };

    let same_port = listen_port.parse::<u16>().ok() == Some(port);
    if same_port && same_host(host, listen_host) {
        return Err(CachefrontError::ForwardingLoop {
            target: target.to_string(),
            listen: listen.to_string(),
        });
    }
    Ok(())
}

fn same_host(target: &str, listen: &str) -> bool {
    let target = target.trim_matches(&['[', ']'][..]);
    let listen = listen.trim_matches(&['[', ']'][..]);
    if target.eq_ignore_ascii_case(listen) {
        return true;
    }

    let is_loopback = |host: &str| {
        host.eq_ignore_ascii_case("localhost")
            || host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
    };
    let is_unspecified = |host: &str| {
        host.parse::<IpAddr>()
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false)
    };

    // A wildcard listener also answers on loopback.
    is_loopback(target) && (is_loopback(listen) || is_unspecified(listen))
}

async fn to_request(
    state: &ServerState,
    request: axum::extract::Request,
) -> CachefrontResult<Request> {
    let (parts, body) = request.into_parts();
    let url = request_url(&state.origin, &parts.uri)?;

    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| CachefrontError::Server(format!("reading request body: {}", e)))?;

    let mut converted = Request::new(parts.method.as_str(), url).with_body(body);
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            converted = converted.with_header(name.as_str(), value);
        }
    }
    Ok(converted)
}

fn into_http(response: Response) -> axum::response::Response {
    let (meta, body) = response.into_parts();
    let mut builder = axum::http::Response::builder().status(meta.status);
    for (name, value) in &meta.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(Body::from(body)).unwrap_or_else(|e| {
        error_response(
            StatusCode::BAD_GATEWAY,
            &CachefrontError::Server(format!("unrepresentable response: {}", e)),
        )
    })
}

fn error_response(status: StatusCode, error: &CachefrontError) -> axum::response::Response {
    warn!("{}: {}", status, error);
    (status, error.to_string()).into_response()
}
