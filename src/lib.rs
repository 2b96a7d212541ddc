//! cachefront - cache-first offline proxy
//!
//! Keeps an application's shell in versioned cache generations, answers
//! same-origin GET requests from cache before the network, stores network
//! responses behind the caller's back, and falls back to a cached document
//! when the network is gone.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod http;
pub mod network;
pub mod server;
pub mod storage;
pub mod worker;

pub use error::{CachefrontError, CachefrontResult};
