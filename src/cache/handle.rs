//! Ephemeral display handles
//!
//! Every payload handed to a caller is wrapped in an `ImageHandle` with a
//! process-unique `blob:imgcache/<uuid>` URL. The registry tracks which
//! handles are still alive; a handle leaves it when released or dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Scheme prefix of handle URLs
pub const HANDLE_SCHEME: &str = "blob:imgcache/";

/// Tracks live handles (handle URL -> content id)
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<Mutex<HashMap<String, String>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new handle over `payload`
    pub fn issue(&self, id: &str, payload: Arc<[u8]>, mime_type: &str) -> ImageHandle {
        let url = format!("{}{}", HANDLE_SCHEME, Uuid::new_v4());
        self.lock().insert(url.clone(), id.to_string());

        ImageHandle {
            url,
            id: id.to_string(),
            payload,
            mime_type: mime_type.to_string(),
            registry: self.clone(),
        }
    }

    /// Number of handles not yet released
    pub fn live_handles(&self) -> usize {
        self.lock().len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    fn release(&self, url: &str) {
        self.lock().remove(url);
    }
}

/// Displayable image: a handle URL plus the bytes behind it
///
/// Not `Clone`: exactly one owner releases it.
pub struct ImageHandle {
    url: String,
    id: String,
    payload: Arc<[u8]>,
    mime_type: String,
    registry: HandleRegistry,
}

impl ImageHandle {
    /// Ephemeral URL, valid until the handle is released
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Content id the payload belongs to
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Release the handle; equivalent to dropping it
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("url", &self.url)
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("len", &self.payload.len())
            .finish()
    }
}
