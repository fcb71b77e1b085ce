//! Error types for imgcache
//!
//! Internal layers use `ImgCacheResult<T>`. None of these errors cross the
//! orchestrator boundary: every failure there has a defined fallback value.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgcache operations
pub type ImgCacheResult<T> = Result<T, ImgCacheError>;

/// All errors that can occur in imgcache
#[derive(Error, Debug)]
pub enum ImgCacheError {
    // Network errors
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Image service unavailable ({status}): {url}")]
    ServiceUnavailable { url: String, status: u16 },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Image proxy returned no image URL: {0}")]
    ProxyEmpty(String),

    // Payload errors
    #[error("Payload from {url} too small: {size} bytes (minimum {min})")]
    PayloadTooSmall { url: String, size: u64, min: u64 },

    // Storage errors
    #[error("Image store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Corrupt cache record for {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ImgCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error for a URL
    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if the failure should escalate to the next image source
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::ServiceUnavailable { .. }
                | Self::HttpStatus { .. }
                | Self::ProxyEmpty(_)
                | Self::PayloadTooSmall { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StoreUnavailable(_) => Some("Check that the cache directory is writable, or pass --store-dir"),
            Self::ConfigInvalid { .. } => Some("Run: imgcache config init --force"),
            Self::ProxyEmpty(_) => Some("Check [sources] proxy_base and proxy_path in config"),
            _ => None,
        }
    }
}
