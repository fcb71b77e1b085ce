//! In-memory image store

use super::{CacheEntry, EntryMeta, ImageStore};
use crate::error::ImgCacheResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Image store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn get(&self, id: &str) -> ImgCacheResult<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> ImgCacheResult<()> {
        self.entries
            .write()
            .await
            .insert(entry.meta.id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &str) -> ImgCacheResult<bool> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn scan(&self) -> ImgCacheResult<Vec<EntryMeta>> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .map(|e| e.meta.clone())
            .collect())
    }

    async fn clear(&self) -> ImgCacheResult<usize> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
