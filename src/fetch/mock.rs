//! Scripted transport for tests

use super::transport::{HttpResponse, HttpTransport, RequestMode};
use crate::error::{ImgCacheError, ImgCacheResult};
use async_trait::async_trait;
use std::sync::Mutex;

/// JPEG-looking payload of exactly `size` bytes
pub fn jpeg(size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    let magic = [0xFF, 0xD8, 0xFF, 0xE0];
    let n = magic.len().min(size);
    bytes[..n].copy_from_slice(&magic[..n]);
    bytes
}

/// Answers by longest matching URL prefix; unmatched URLs fail to connect
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(String, HttpResponse)>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, prefix: &str, response: HttpResponse) -> Self {
        self.routes.push((prefix.to_string(), response));
        self
    }

    pub fn image(self, prefix: &str, size: usize) -> Self {
        self.respond(prefix, HttpResponse::new(200, Some("image/jpeg"), jpeg(size)))
    }

    pub fn status(self, prefix: &str, status: u16) -> Self {
        self.respond(prefix, HttpResponse::new(status, None, vec![]))
    }

    pub fn json(self, prefix: &str, body: serde_json::Value) -> Self {
        self.json_status(prefix, 200, body)
    }

    pub fn json_status(self, prefix: &str, status: u16, body: serde_json::Value) -> Self {
        self.respond(
            prefix,
            HttpResponse::new(status, Some("application/json"), body.to_string().into_bytes()),
        )
    }

    /// Every requested URL, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, _mode: RequestMode) -> ImgCacheResult<HttpResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        self.routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone())
            .ok_or_else(|| ImgCacheError::transport(url, "connection refused"))
    }
}
