//! Image proxy endpoint client
//!
//! The proxy answers `GET {base}{path}?w=..&h=..[&query=..]` with JSON
//! naming a concrete image URL, or a 500 with `{ error, details }`.

use super::transport::{HttpTransport, RequestMode};
use crate::error::{ImgCacheError, ImgCacheResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Successful proxy answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub urls: Option<ProxyUrls>,
    #[serde(default)]
    pub attribution: Option<Attribution>,
}

/// Sized variants offered by richer proxies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyUrls {
    #[serde(default)]
    pub regular: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

impl ProxyImage {
    /// Concrete image URL: `urls.regular`, then `urls.small`, then `url`
    pub fn image_url(&self) -> Option<&str> {
        let sized = self
            .urls
            .as_ref()
            .and_then(|u| u.regular.as_deref().or(u.small.as_deref()));
        sized
            .or(self.url.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// Ask the proxy for an image URL
pub async fn resolve_proxy(transport: &dyn HttpTransport, url: &str) -> ImgCacheResult<ProxyImage> {
    let response = transport.get(url, RequestMode::Default).await?;

    if response.is_overloaded() {
        return Err(ImgCacheError::ServiceUnavailable {
            url: url.to_string(),
            status: response.status,
        });
    }

    if !response.is_success() {
        return Err(match serde_json::from_slice::<ProxyErrorBody>(&response.body) {
            Ok(body) => ImgCacheError::transport(
                url,
                match body.details {
                    Some(details) => format!("{} ({})", body.error, details),
                    None => body.error,
                },
            ),
            Err(_) => ImgCacheError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            },
        });
    }

    let image: ProxyImage = serde_json::from_slice(&response.body)
        .map_err(|e| ImgCacheError::ProxyEmpty(format!("{}: {}", url, e)))?;

    if image.image_url().is_none() {
        return Err(ImgCacheError::ProxyEmpty(url.to_string()));
    }

    if let Some(attribution) = &image.attribution {
        debug!(
            "Proxy image from {} ({})",
            attribution.source.as_deref().unwrap_or("unknown source"),
            attribution.url.as_deref().unwrap_or("-")
        );
    }

    Ok(image)
}

/// Result of a proxy self-test
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub endpoint: String,
    pub image_url: String,
    pub attribution: Option<Attribution>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Check that the proxy endpoint answers with a usable image URL
pub async fn probe(transport: &dyn HttpTransport, endpoint: &str) -> ImgCacheResult<ProbeReport> {
    let started = Instant::now();
    let image = resolve_proxy(transport, endpoint).await?;
    let image_url = image
        .image_url()
        .ok_or_else(|| ImgCacheError::ProxyEmpty(endpoint.to_string()))?
        .to_string();

    Ok(ProbeReport {
        endpoint: endpoint.to_string(),
        image_url,
        attribution: image.attribution,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockTransport;
    use serde_json::json;

    const ENDPOINT: &str = "http://localhost:3000/api/image?w=800&h=600";

    #[test]
    fn image_url_preference() {
        let image: ProxyImage = serde_json::from_value(json!({
            "url": "https://picsum.photos/800/600",
            "urls": { "small": "https://cdn.example.com/s.jpg" }
        }))
        .unwrap();
        assert_eq!(image.image_url(), Some("https://cdn.example.com/s.jpg"));

        let image: ProxyImage = serde_json::from_value(json!({
            "url": "https://picsum.photos/800/600",
            "urls": { "regular": "https://cdn.example.com/r.jpg", "small": "x" }
        }))
        .unwrap();
        assert_eq!(image.image_url(), Some("https://cdn.example.com/r.jpg"));

        let image: ProxyImage = serde_json::from_value(json!({ "url": "  " })).unwrap();
        assert_eq!(image.image_url(), None);
    }

    #[tokio::test]
    async fn resolves_plain_url_with_attribution() {
        let transport = MockTransport::new().json(
            ENDPOINT,
            json!({
                "url": "https://picsum.photos/800/600?random=1",
                "attribution": { "source": "Picsum Photos", "url": "https://picsum.photos" }
            }),
        );

        let image = resolve_proxy(&transport, ENDPOINT).await.unwrap();
        assert_eq!(image.image_url(), Some("https://picsum.photos/800/600?random=1"));
        assert_eq!(
            image.attribution.unwrap().source.as_deref(),
            Some("Picsum Photos")
        );
    }

    #[tokio::test]
    async fn error_body_becomes_transport_error() {
        let transport = MockTransport::new().json_status(
            ENDPOINT,
            500,
            json!({ "error": "Failed to fetch image", "details": "upstream down" }),
        );

        let err = resolve_proxy(&transport, ENDPOINT).await.unwrap_err();
        assert!(err.to_string().contains("upstream down"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_answer_is_proxy_empty() {
        let transport = MockTransport::new().json(ENDPOINT, json!({}));
        let err = resolve_proxy(&transport, ENDPOINT).await.unwrap_err();
        assert!(matches!(err, ImgCacheError::ProxyEmpty(_)));
    }

    #[tokio::test]
    async fn overload_is_service_unavailable() {
        let transport = MockTransport::new().status(ENDPOINT, 503);
        let err = resolve_proxy(&transport, ENDPOINT).await.unwrap_err();
        assert!(matches!(
            err,
            ImgCacheError::ServiceUnavailable { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn probe_reports_image_url() {
        let transport = MockTransport::new().json(
            ENDPOINT,
            json!({ "urls": { "regular": "https://cdn.example.com/r.jpg" } }),
        );
        let report = probe(&transport, ENDPOINT).await.unwrap();
        assert_eq!(report.endpoint, ENDPOINT);
        assert_eq!(report.image_url, "https://cdn.example.com/r.jpg");
        assert!(report.attribution.is_none());
    }
}
