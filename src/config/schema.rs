//! Configuration schema for imgcache
//!
//! Configuration is stored at `~/.config/imgcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Seven days, the default cache max age
pub const DEFAULT_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Payloads below this size are treated as broken images
pub const DEFAULT_MIN_VALID_BYTES: u64 = 100;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Image source settings
    pub sources: SourcesConfig,

    /// Local cache settings
    pub cache: CacheConfig,

    /// Network fetch settings
    pub fetch: FetchConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Image source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Skip every network tier and serve local default assets
    pub use_local_images_only: bool,

    /// Origin the proxy endpoint lives on
    pub proxy_base: String,

    /// Path of the random-image proxy endpoint
    pub proxy_path: String,

    /// Requested image width
    pub width: u32,

    /// Requested image height
    pub height: u32,

    /// Primary remote image source (entries from it are tagged `primary`)
    pub primary_source: String,

    /// Topic hints for proxy attempts 1..=3 (opaque query values)
    pub keyword_hints: Vec<String>,

    /// Backup services, best first
    pub backup_sources: Vec<String>,

    /// Hosts that must never be the first candidate
    pub unstable_sources: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            use_local_images_only: false,
            proxy_base: "http://localhost:3000".to_string(),
            proxy_path: "/api/image".to_string(),
            width: 800,
            height: 600,
            primary_source: "https://source.unsplash.com".to_string(),
            keyword_hints: vec![
                "training,model".to_string(),
                "ai,neural".to_string(),
                "technology".to_string(),
            ],
            backup_sources: vec![
                "https://images.unsplash.com".to_string(),
                "https://loremflickr.com".to_string(),
                "https://placekitten.com".to_string(),
            ],
            unstable_sources: vec!["picsum.photos".to_string(), "fastly.picsum".to_string()],
        }
    }
}

/// Local image cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the persistent cache (default: true)
    pub enabled: bool,

    /// Entries older than this are never returned as hits
    pub max_age_ms: u64,

    /// Minimum payload size for an entry to be usable
    pub min_valid_bytes: u64,

    /// Store directory override
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_ms: DEFAULT_MAX_AGE_MS,
            min_valid_bytes: DEFAULT_MIN_VALID_BYTES,
            dir: None,
        }
    }
}

impl CacheConfig {
    /// Max age as a duration
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
}

/// Network fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Escalations through the resolver before giving up
    pub max_retries: u32,

    /// Per-request timeout
    pub request_timeout_ms: u64,

    /// Wall-clock bound on one whole resolution
    pub resolve_timeout_ms: u64,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout_ms: 10_000,
            resolve_timeout_ms: 30_000,
            user_agent: format!("imgcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}
