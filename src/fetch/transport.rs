//! HTTP transport abstraction
//!
//! The fetcher never talks to the network directly. It goes through
//! `HttpTransport`, which has a blocking `ureq` implementation for
//! production and a scripted one for tests.

use crate::config::schema::FetchConfig;
use crate::error::{ImgCacheError, ImgCacheResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Upper bound on a single response body
const MAX_BODY_BYTES: u64 = 25 * 1024 * 1024;

/// How a request presents itself to the image host
///
/// Mirrors the request modes a browser would try: some image hosts answer
/// differently depending on fetch metadata and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Cross-origin, credentials omitted
    CorsOmit,
    /// Cross-origin request presented as same-origin
    CorsSameOrigin,
    /// Opaque no-cors request
    NoCors,
    /// No fetch metadata at all
    Default,
}

impl RequestMode {
    /// Order in which modes are tried for every URL variant
    pub const ALL: [RequestMode; 4] = [
        RequestMode::CorsOmit,
        RequestMode::CorsSameOrigin,
        RequestMode::NoCors,
        RequestMode::Default,
    ];

    /// Extra request headers for this mode
    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::CorsOmit => &[("Sec-Fetch-Mode", "cors"), ("Sec-Fetch-Site", "cross-site")],
            Self::CorsSameOrigin => &[
                ("Sec-Fetch-Mode", "cors"),
                ("Sec-Fetch-Site", "same-origin"),
            ],
            Self::NoCors => &[
                ("Sec-Fetch-Mode", "no-cors"),
                ("Sec-Fetch-Site", "cross-site"),
            ],
            Self::Default => &[],
        }
    }
}

/// A completed HTTP exchange, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 429 or 503: the service is shedding load
    pub fn is_overloaded(&self) -> bool {
        matches!(self.status, 429 | 503)
    }

    /// Content type without parameters (`image/png; q=1` -> `image/png`)
    pub fn mime(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| !ct.is_empty())
    }
}

/// Async HTTP GET
///
/// Non-2xx statuses are returned as responses, not errors. Errors are
/// reserved for requests that produced no response at all.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, mode: RequestMode) -> ImgCacheResult<HttpResponse>;
}

/// Production transport backed by a shared `ureq` agent
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
    timeout: Duration,
}

impl UreqTransport {
    pub fn new(config: &FetchConfig) -> Self {
        let timeout = config.request_timeout();
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
            timeout,
        }
    }

    fn get_blocking(
        agent: &ureq::Agent,
        user_agent: &str,
        timeout: Duration,
        url: &str,
        mode: RequestMode,
    ) -> ImgCacheResult<HttpResponse> {
        let mut request = agent
            .get(url)
            .header("User-Agent", user_agent)
            .header("Accept", "image/*,application/json;q=0.9,*/*;q=0.5");
        for (name, value) in mode.headers() {
            request = request.header(*name, *value);
        }

        let mut response = request.call().map_err(|e| match e {
            ureq::Error::Timeout(_) => ImgCacheError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            },
            other => ImgCacheError::transport(url, other),
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| ImgCacheError::transport(url, e))?;

        trace!("HTTP {} for {} ({} bytes, {:?})", status, url, body.len(), mode);

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn get(&self, url: &str, mode: RequestMode) -> ImgCacheResult<HttpResponse> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let timeout = self.timeout;
        let target = url.to_string();

        tokio::task::spawn_blocking(move || {
            Self::get_blocking(&agent, &user_agent, timeout, &target, mode)
        })
        .await
        .map_err(|e| ImgCacheError::Internal(format!("HTTP worker failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_statuses() {
        assert!(HttpResponse::new(429, None, vec![]).is_overloaded());
        assert!(HttpResponse::new(503, None, vec![]).is_overloaded());
        assert!(!HttpResponse::new(500, None, vec![]).is_overloaded());
        assert!(!HttpResponse::new(503, None, vec![]).is_success());
        assert!(HttpResponse::new(204, None, vec![]).is_success());
    }

    #[test]
    fn mime_strips_parameters() {
        let resp = HttpResponse::new(200, Some("image/jpeg; charset=binary"), vec![]);
        assert_eq!(resp.mime(), Some("image/jpeg"));
        assert_eq!(HttpResponse::new(200, Some(""), vec![]).mime(), None);
    }

    #[test]
    fn modes_carry_fetch_metadata() {
        assert_eq!(RequestMode::ALL[0], RequestMode::CorsOmit);
        assert!(RequestMode::NoCors
            .headers()
            .contains(&("Sec-Fetch-Mode", "no-cors")));
        assert!(RequestMode::Default.headers().is_empty());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let config = FetchConfig {
            request_timeout_ms: 500,
            ..FetchConfig::default()
        };
        let transport = UreqTransport::new(&config);

        let err = transport
            .get("http://127.0.0.1:9/nothing", RequestMode::Default)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
