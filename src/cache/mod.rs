//! Local image cache
//!
//! Validated, time-bounded image payloads keyed by content id, on top of
//! an `ImageStore`. Nothing here returns an error: storage failures are
//! logged and read as a miss or a rejected write.
//!
//! # Entry States
//!
//! | State | `get` | Description |
//! |-------|-------|-------------|
//! | Fresh | hit | age within max age, payload above the size floor |
//! | Expired | miss | still stored until the next expiry sweep |
//! | Undersized | miss | only returned when validation is off |

pub mod handle;

pub use handle::{HandleRegistry, ImageHandle, HANDLE_SCHEME};

use crate::assets;
use crate::config::schema::CacheConfig;
use crate::store::{CacheEntry, DiskStore, EntryMeta, ImageBlob, ImageStore, UnavailableStore};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache summary for display
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub backend: &'static str,
    pub available: bool,
    pub entries: usize,
    pub total_bytes: u64,
    pub expired: usize,
    pub live_handles: usize,
}

/// Persistent image cache
pub struct LocalImageCache {
    store: Arc<dyn ImageStore>,
    handles: HandleRegistry,
    max_age: Duration,
    min_valid_bytes: u64,
}

impl LocalImageCache {
    pub fn new(store: Arc<dyn ImageStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            handles: HandleRegistry::new(),
            max_age: config.max_age(),
            min_valid_bytes: config.min_valid_bytes,
        }
    }

    /// Cache that stores nothing
    pub fn disabled() -> Self {
        Self::new(
            Arc::new(UnavailableStore::new("cache disabled")),
            &CacheConfig::default(),
        )
    }

    /// Open the disk-backed cache, degrading to no cache at all when the
    /// store cannot be opened
    pub async fn open(config: &CacheConfig, dir: &Path) -> Self {
        if !config.enabled {
            debug!("Image cache disabled in config");
            return Self::new(
                Arc::new(UnavailableStore::new("cache disabled in config")),
                config,
            );
        }

        match DiskStore::open(dir).await {
            Ok(store) => Self::new(Arc::new(store), config),
            Err(e) => {
                warn!("Image cache unavailable, continuing without it: {}", e);
                Self::new(Arc::new(UnavailableStore::new(e.to_string())), config)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Handles issued by this cache and not yet released
    pub fn live_handles(&self) -> usize {
        self.handles.live_handles()
    }

    /// Look up a usable entry
    ///
    /// Misses on absent, expired, or (with `validate`) undersized and
    /// truncated entries. Expired entries stay stored until `evict_expired`.
    pub async fn get(&self, id: &str, validate: bool) -> Option<ImageHandle> {
        let entry = match self.store.get(id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read for {} failed: {}", id, e);
                return None;
            }
        };

        let age_ms = entry.meta.age_ms(Utc::now().timestamp_millis());
        if u128::from(age_ms) > self.max_age.as_millis() {
            debug!("Cache entry {} expired ({} ms old)", id, age_ms);
            return None;
        }

        if validate && (entry.meta.size_bytes < self.min_valid_bytes || !entry.is_intact()) {
            debug!(
                "Cache entry {} invalid ({} of {} bytes)",
                id,
                entry.payload.len(),
                entry.meta.size_bytes
            );
            return None;
        }

        Some(
            self.handles
                .issue(id, entry.payload.clone(), &entry.meta.mime_type),
        )
    }

    /// Store a payload for `id`, replacing any previous entry
    ///
    /// Returns false for placeholder sources, undersized payloads, or a
    /// store that could not be written.
    pub async fn put(&self, id: &str, source_url: &str, blob: &ImageBlob) -> bool {
        if assets::is_placeholder(source_url) {
            debug!("Not caching placeholder source {:?} for {}", source_url, id);
            return false;
        }

        if (blob.len() as u64) < self.min_valid_bytes {
            debug!(
                "Not caching {} bytes for {} (minimum {})",
                blob.len(),
                id,
                self.min_valid_bytes
            );
            return false;
        }

        if !self.store.is_available() {
            return false;
        }

        match self.store.put(CacheEntry::new(id, source_url, blob)).await {
            Ok(()) => {
                info!(
                    "Cached {} ({} bytes, {}, {})",
                    id,
                    blob.len(),
                    blob.mime_type,
                    blob.provenance
                );
                true
            }
            Err(e) => {
                warn!("Cache write for {} failed: {}", id, e);
                false
            }
        }
    }

    /// Handle over bytes that never made it into the store
    pub fn adopt(&self, id: &str, blob: &ImageBlob) -> ImageHandle {
        self.handles
            .issue(id, Arc::from(blob.bytes.as_slice()), &blob.mime_type)
    }

    /// Remove every entry older than `max_age`, returning how many went
    pub async fn evict_expired(&self, max_age: Duration) -> usize {
        let metas = match self.store.scan().await {
            Ok(metas) => metas,
            Err(e) => {
                warn!("Cache sweep failed: {}", e);
                return 0;
            }
        };

        let now = Utc::now().timestamp_millis();
        let mut removed = 0;
        for meta in metas {
            if u128::from(meta.age_ms(now)) <= max_age.as_millis() {
                continue;
            }
            match self.store.delete(&meta.id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to evict {}: {}", meta.id, e),
            }
        }

        if removed > 0 {
            info!("Evicted {} expired image(s)", removed);
        }
        removed
    }

    /// Drop the entry for `id`
    pub async fn invalidate(&self, id: &str) -> bool {
        match self.store.delete(id).await {
            Ok(existed) => {
                if existed {
                    debug!("Invalidated cache entry {}", id);
                }
                existed
            }
            Err(e) => {
                warn!("Failed to invalidate {}: {}", id, e);
                false
            }
        }
    }

    /// Metadata of all entries, newest first
    pub async fn entries(&self) -> Vec<EntryMeta> {
        match self.store.scan().await {
            Ok(mut metas) => {
                metas.sort_by(|a, b| {
                    b.timestamp_ms
                        .cmp(&a.timestamp_ms)
                        .then_with(|| a.id.cmp(&b.id))
                });
                metas
            }
            Err(e) => {
                warn!("Cache listing failed: {}", e);
                vec![]
            }
        }
    }

    pub async fn clear(&self) -> usize {
        match self.store.clear().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Cache clear failed: {}", e);
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries().await;
        let now = Utc::now().timestamp_millis();

        CacheStats {
            backend: self.backend_name(),
            available: self.is_available(),
            entries: entries.len(),
            total_bytes: entries.iter().map(|m| m.size_bytes).sum(),
            expired: entries
                .iter()
                .filter(|m| u128::from(m.age_ms(now)) > self.max_age.as_millis())
                .count(),
            live_handles: self.live_handles(),
        }
    }
}
