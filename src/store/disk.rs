//! Disk-backed image store
//!
//! One record file per content id, named by the SHA-256 of the id so any id
//! is a safe file name. Records are written to a temp file and renamed into
//! place: a concurrent reader sees the old record or the new one.
//!
//! Record layout: `IMGC` | meta length (u32 LE) | meta JSON | payload.

use super::{CacheEntry, EntryMeta, ImageStore};
use crate::error::{ImgCacheError, ImgCacheResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Current on-disk schema; any other version is cleared on open
pub const SCHEMA_VERSION: u32 = 1;

const RECORD_MAGIC: &[u8; 4] = b"IMGC";
const RECORD_EXT: &str = "rec";
const TEMP_EXT_PREFIX: &str = "tmp-";
const VERSION_FILE: &str = "VERSION";
const HEADER_LEN: usize = 8;

/// Image store persisted under a directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> ImgCacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            ImgCacheError::io(format!("creating image store {}", root.display()), e)
        })?;

        let store = Self { root };
        store.migrate().await?;
        debug!("Opened image store at {}", store.root.display());
        Ok(store)
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Clear the store outright unless it carries the current schema version
    async fn migrate(&self) -> ImgCacheResult<()> {
        let version_path = self.root.join(VERSION_FILE);
        let found = match fs::read_to_string(&version_path).await {
            Ok(content) => content.trim().parse::<u32>().ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ImgCacheError::io(
                    format!("reading {}", version_path.display()),
                    e,
                ))
            }
        };

        if found == Some(SCHEMA_VERSION) {
            return Ok(());
        }

        let removed = self.clear().await?;
        if found.is_some() || removed > 0 {
            info!(
                "Image store schema {:?} replaced by v{}, cleared {} record(s)",
                found, SCHEMA_VERSION, removed
            );
        }

        write_atomic(&version_path, SCHEMA_VERSION.to_string().as_bytes()).await
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", record_key(id), RECORD_EXT))
    }

    async fn read_meta(path: &Path) -> ImgCacheResult<EntryMeta> {
        let mut file = fs::File::open(path)
            .await
            .map_err(|e| ImgCacheError::io(format!("opening {}", path.display()), e))?;

        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header)
            .await
            .map_err(|e| ImgCacheError::io(format!("reading header of {}", path.display()), e))?;
        let meta_len = parse_header(&header, path)?;

        let file_len = file
            .metadata()
            .await
            .map_err(|e| ImgCacheError::io(format!("reading size of {}", path.display()), e))?
            .len();
        if meta_len as u64 > file_len.saturating_sub(HEADER_LEN as u64) {
            return Err(ImgCacheError::CorruptRecord {
                id: path.display().to_string(),
                reason: format!("metadata length {} exceeds file size {}", meta_len, file_len),
            });
        }

        let mut meta = vec![0u8; meta_len];
        file.read_exact(&mut meta)
            .await
            .map_err(|e| ImgCacheError::io(format!("reading metadata of {}", path.display()), e))?;

        Ok(serde_json::from_slice(&meta)?)
    }
}

/// File-name key for a content id
pub(crate) fn record_key(id: &str) -> String {
    hex::encode(Sha256::digest(id.as_bytes()))
}

fn parse_header(header: &[u8; HEADER_LEN], path: &Path) -> ImgCacheResult<usize> {
    if &header[..4] != RECORD_MAGIC {
        return Err(ImgCacheError::CorruptRecord {
            id: path.display().to_string(),
            reason: "bad magic".to_string(),
        });
    }
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Ok(len as usize)
}

fn encode_record(entry: &CacheEntry) -> ImgCacheResult<Vec<u8>> {
    let meta = serde_json::to_vec(&entry.meta)?;
    let meta_len = u32::try_from(meta.len())
        .map_err(|_| ImgCacheError::Internal("record metadata too large".to_string()))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + meta.len() + entry.payload.len());
    buf.extend_from_slice(RECORD_MAGIC);
    buf.extend_from_slice(&meta_len.to_le_bytes());
    buf.extend_from_slice(&meta);
    buf.extend_from_slice(&entry.payload);
    Ok(buf)
}

fn decode_record(id: &str, data: &[u8], path: &Path) -> ImgCacheResult<CacheEntry> {
    let corrupt = |reason: &str| ImgCacheError::CorruptRecord {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    let header: &[u8; HEADER_LEN] = data
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| corrupt("truncated header"))?;
    let meta_len = parse_header(header, path)?;

    let meta_end = HEADER_LEN + meta_len;
    let meta_bytes = data
        .get(HEADER_LEN..meta_end)
        .ok_or_else(|| corrupt("truncated metadata"))?;
    let meta: EntryMeta = serde_json::from_slice(meta_bytes)?;

    if meta.id != id {
        return Err(corrupt("record belongs to another id"));
    }

    let entry = CacheEntry {
        meta,
        payload: Arc::from(&data[meta_end..]),
    };
    if !entry.is_intact() {
        return Err(corrupt("payload length does not match metadata"));
    }
    Ok(entry)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> ImgCacheResult<()> {
    let tmp = path.with_extension(format!("{}{}", TEMP_EXT_PREFIX, Uuid::new_v4().simple()));

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| ImgCacheError::io(format!("writing {}", tmp.display()), e))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ImgCacheError::io(
            format!("moving record into place at {}", path.display()),
            e,
        ));
    }
    Ok(())
}

fn has_extension(path: &Path, pred: impl Fn(&str) -> bool) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(pred)
}

#[async_trait]
impl ImageStore for DiskStore {
    async fn get(&self, id: &str) -> ImgCacheResult<Option<CacheEntry>> {
        let path = self.record_path(id);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ImgCacheError::io(
                    format!("reading record {}", path.display()),
                    e,
                ))
            }
        };

        decode_record(id, &data, &path).map(Some)
    }

    async fn put(&self, entry: CacheEntry) -> ImgCacheResult<()> {
        let path = self.record_path(entry.id());
        let record = encode_record(&entry)?;
        write_atomic(&path, &record).await
    }

    async fn delete(&self, id: &str) -> ImgCacheResult<bool> {
        let path = self.record_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ImgCacheError::io(
                format!("removing record {}", path.display()),
                e,
            )),
        }
    }

    async fn scan(&self) -> ImgCacheResult<Vec<EntryMeta>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| ImgCacheError::io("reading image store directory", e))?;

        let mut metas = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ImgCacheError::io("reading image store entry", e))?
        {
            let path = entry.path();
            if !has_extension(&path, |ext| ext == RECORD_EXT) {
                continue;
            }
            match Self::read_meta(&path).await {
                Ok(meta) => metas.push(meta),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        Ok(metas)
    }

    async fn clear(&self) -> ImgCacheResult<usize> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| ImgCacheError::io("reading image store directory", e))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ImgCacheError::io("reading image store entry", e))?
        {
            let path = entry.path();
            let is_record = has_extension(&path, |ext| ext == RECORD_EXT);
            let is_temp = has_extension(&path, |ext| ext.starts_with(TEMP_EXT_PREFIX));
            if !is_record && !is_temp {
                continue;
            }
            fs::remove_file(&path)
                .await
                .map_err(|e| ImgCacheError::io(format!("removing {}", path.display()), e))?;
            if is_record {
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
