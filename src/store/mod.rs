//! Persistent image store
//!
//! A single collection of cache entries keyed by content id, behind a small
//! async port so the cache logic does not care where bytes live.
//!
//! | Backend | Use |
//! |---------|-----|
//! | `DiskStore` | one record file per id under the state directory |
//! | `MemoryStore` | tests and ephemeral runs |
//! | `UnavailableStore` | no persistent storage in this runtime |

mod disk;
mod memory;

pub use disk::{DiskStore, SCHEMA_VERSION};
pub use memory::MemoryStore;

use crate::error::{ImgCacheError, ImgCacheResult};
use crate::mime;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which source tier produced a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Primary,
    Backup,
    Original,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backup => write!(f, "backup"),
            Self::Original => write!(f, "original"),
        }
    }
}

/// Downloaded image bytes, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub provenance: Provenance,
}

impl ImageBlob {
    /// Wrap raw bytes, sniffing the MIME type
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime_type = mime::sniff(&bytes).to_string();
        Self {
            bytes,
            mime_type,
            provenance: Provenance::Original,
        }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Everything about a cache entry except its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Content identifier, unique key
    pub id: String,
    /// URL that produced the payload
    pub source_url: String,
    /// Write time, ms since the Unix epoch
    pub timestamp_ms: i64,
    pub size_bytes: u64,
    pub mime_type: String,
    pub provenance: Provenance,
}

impl EntryMeta {
    /// Age relative to `now_ms`; entries from the future count as fresh
    pub fn age_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(now_ms.saturating_sub(self.timestamp_ms)).unwrap_or(0)
    }
}

/// A stored image: metadata plus the exclusively owned payload
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub meta: EntryMeta,
    pub payload: Arc<[u8]>,
}

impl CacheEntry {
    /// Build an entry stamped with the current time
    pub fn new(id: &str, source_url: &str, blob: &ImageBlob) -> Self {
        Self::at(id, source_url, blob, Utc::now().timestamp_millis())
    }

    /// Build an entry with an explicit timestamp
    pub fn at(id: &str, source_url: &str, blob: &ImageBlob, timestamp_ms: i64) -> Self {
        Self {
            meta: EntryMeta {
                id: id.to_string(),
                source_url: source_url.to_string(),
                timestamp_ms,
                size_bytes: blob.len() as u64,
                mime_type: blob.mime_type.clone(),
                provenance: blob.provenance,
            },
            payload: Arc::from(blob.bytes.as_slice()),
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Payload length matches what the metadata recorded
    pub fn is_intact(&self) -> bool {
        self.payload.len() as u64 == self.meta.size_bytes
    }
}

/// Storage port: get / put / delete / scan
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch one entry with its payload
    async fn get(&self, id: &str) -> ImgCacheResult<Option<CacheEntry>>;

    /// Insert or replace the entry for `entry.meta.id`
    async fn put(&self, entry: CacheEntry) -> ImgCacheResult<()>;

    /// Remove an entry, returning whether it existed
    async fn delete(&self, id: &str) -> ImgCacheResult<bool>;

    /// Metadata of every entry, without payloads
    async fn scan(&self) -> ImgCacheResult<Vec<EntryMeta>>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> ImgCacheResult<usize>;

    /// Whether writes can succeed at all
    fn is_available(&self) -> bool {
        true
    }

    /// Human-readable backend name
    fn backend_name(&self) -> &'static str;
}

/// Store used when no persistent storage exists
///
/// Reads find nothing and writes fail, so the cache degrades to a no-op.
#[derive(Debug, Clone, Default)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ImageStore for UnavailableStore {
    async fn get(&self, _id: &str) -> ImgCacheResult<Option<CacheEntry>> {
        Ok(None)
    }

    async fn put(&self, _entry: CacheEntry) -> ImgCacheResult<()> {
        Err(ImgCacheError::StoreUnavailable(self.reason.clone()))
    }

    async fn delete(&self, _id: &str) -> ImgCacheResult<bool> {
        Ok(false)
    }

    async fn scan(&self) -> ImgCacheResult<Vec<EntryMeta>> {
        Ok(vec![])
    }

    async fn clear(&self) -> ImgCacheResult<usize> {
        Ok(0)
    }

    fn is_available(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}
