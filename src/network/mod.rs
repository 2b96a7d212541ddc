//! Network transport abstraction
//!
//! The worker never talks to the network directly; it goes through a
//! `Transport` so tests can script responses and simulate outages.
//! An `Err` from `fetch` means the request never produced a response
//! (DNS failure, refused connection, offline). HTTP error statuses are
//! successful fetches.

mod http;
mod stub;

pub use self::http::HttpTransport;
pub use stub::StubTransport;

use crate::error::CachefrontResult;
use crate::http::{Request, Response};
use async_trait::async_trait;

/// Something that can perform a request against the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and return the response
    async fn fetch(&self, request: &Request) -> CachefrontResult<Response>;

    /// Get the human-readable transport name for display
    fn transport_name(&self) -> &'static str;
}
