//! Error types for cachefront
//!
//! All modules use `CachefrontResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cachefront operations
pub type CachefrontResult<T> = Result<T, CachefrontError>;

/// All errors that can occur in cachefront
#[derive(Error, Debug)]
pub enum CachefrontError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Storage errors
    #[error("Invalid cache generation name: {0}")]
    InvalidGenerationName(String),

    #[error("Corrupt cache entry {path}: {reason}")]
    CacheEntryCorrupt { path: PathBuf, reason: String },

    #[error("Cache storage error: {0}")]
    Storage(String),

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Response body from {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: u64 },

    // Lifecycle errors
    #[error("Static asset installation failed at {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Network unavailable for {url} and offline fallback {fallback} is not cached")]
    OfflineFallbackMissing { url: String, fallback: String },

    // Host errors
    #[error("Server error: {0}")]
    Server(String),

    #[error("Requests for {target} would be forwarded back to the proxy listening on {listen}")]
    ForwardingLoop { target: String, listen: String },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CachefrontError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from the network transport itself
    ///
    /// Only these failures trigger the offline fallback; an HTTP error status
    /// is a successful fetch.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::ResponseTooLarge { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => Some("Run: cachefront config show"),
            Self::OfflineFallbackMissing { .. } => {
                Some("Run: cachefront install (while online) to cache the fallback document")
            }
            Self::ForwardingLoop { .. } => {
                Some("Set network.upstream to the application server, or change server.listen")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CachefrontError::OfflineFallbackMissing {
            url: "https://app.test/new".to_string(),
            fallback: "https://app.test/index.html".to_string(),
        };
        assert!(err.to_string().contains("offline fallback"));
    }

    #[test]
    fn error_hint() {
        let err = CachefrontError::ForwardingLoop {
            target: "http://127.0.0.1:8080/".to_string(),
            listen: "127.0.0.1:8080".to_string(),
        };
        assert!(err.hint().unwrap().contains("network.upstream"));
        assert_eq!(CachefrontError::Internal("x".into()).hint(), None);
    }

    #[test]
    fn network_classification() {
        assert!(CachefrontError::network("https://app.test/", "offline").is_network());
        assert!(!CachefrontError::InstallFailed {
            url: "https://app.test/".to_string(),
            reason: "status 404".to_string(),
        }
        .is_network());
    }
}
