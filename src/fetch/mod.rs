//! Blob fetching
//!
//! Downloads one image as raw bytes. A URL is tried as a matrix of URL
//! variants and request modes; proxy URLs are first resolved to a
//! concrete image URL through the proxy's JSON answer.

pub mod proxy;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use transport::{HttpResponse, HttpTransport, RequestMode, UreqTransport};

use crate::assets;
use crate::error::ImgCacheError;
use crate::mime;
use crate::source::{cache_bust, SourceCandidate, SourceResolver, SourceTier};
use crate::store::ImageBlob;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// A successfully downloaded image and the URL that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBlob {
    /// Canonical URL (after proxy resolution, before cache busting)
    pub url: String,
    pub blob: ImageBlob,
}

/// Result of fetching one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(FetchedBlob),
    /// The host answered 429 or 503
    ServiceUnavailable { url: String, status: u16 },
    /// The proxy endpoint gave no usable image URL
    ProxyFailed(String),
    /// Every variant and mode failed
    Failed { url: String },
}

impl FetchOutcome {
    pub fn into_blob(self) -> Option<FetchedBlob> {
        match self {
            Self::Fetched(fetched) => Some(fetched),
            _ => None,
        }
    }
}

/// URL variants tried in order: as-is, query stripped, `random` swapped
/// for `featured`, cache-busted
pub fn url_variants(url: &str) -> Vec<String> {
    let mut variants = vec![url.to_string()];
    let parsed = Url::parse(url).ok();

    if let Some(parsed) = &parsed {
        if parsed.query().is_some() {
            let mut stripped = parsed.clone();
            stripped.set_query(None);
            stripped.set_fragment(None);
            variants.push(stripped.to_string());
        }
    }

    if url.contains("random") {
        variants.push(url.replacen("random", "featured", 1));
    }

    if let Some(mut busted) = parsed {
        busted.query_pairs_mut().append_pair("cache", &cache_bust());
        variants.push(busted.to_string());
    }

    let mut unique: Vec<String> = Vec::with_capacity(variants.len());
    for variant in variants {
        if !unique.contains(&variant) {
            unique.push(variant);
        }
    }
    unique
}

/// Downloads image payloads through an `HttpTransport`
pub struct BlobFetcher {
    transport: Arc<dyn HttpTransport>,
    resolver: Arc<SourceResolver>,
    max_retries: u32,
}

impl BlobFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        resolver: Arc<SourceResolver>,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            resolver,
            max_retries,
        }
    }

    /// Download `url`, escalating through the resolver while the failing
    /// URL is on an unstable host. `None` when nothing could be fetched.
    pub async fn fetch_blob(&self, url: &str, retry_count: u32) -> Option<FetchedBlob> {
        self.fetch(url, retry_count).await.into_blob()
    }

    /// Like `fetch_blob`, reporting why nothing was fetched
    pub async fn fetch(&self, url: &str, retry_count: u32) -> FetchOutcome {
        if assets::is_local_asset(url) {
            debug!("Not fetching local asset {}", url);
            return FetchOutcome::Failed {
                url: url.to_string(),
            };
        }

        let tier = if self.resolver.is_proxy_url(url) {
            SourceTier::ProxyRandom
        } else {
            SourceTier::Original
        };
        let mut candidate = SourceCandidate::new(url, tier);
        let mut retry = retry_count;
        // a proxy URL occupies chain index `retry_count` itself
        let mut next_index = if tier.is_proxy() {
            retry_count + 1
        } else {
            retry_count
        };

        loop {
            let outcome = self.fetch_candidate(&candidate).await;
            let escalate = match &outcome {
                FetchOutcome::Fetched(_) => false,
                FetchOutcome::ProxyFailed(_) => true,
                FetchOutcome::ServiceUnavailable { url, .. } | FetchOutcome::Failed { url } => {
                    self.resolver.is_unstable(url) || self.resolver.is_unstable(&candidate.url)
                }
            };

            if !escalate {
                return outcome;
            }
            if retry >= self.max_retries {
                debug!("Giving up on {} after {} escalation(s)", url, retry);
                return outcome;
            }

            let next = self.resolver.next_candidate(&candidate.url, next_index);
            if next.tier == SourceTier::Local {
                return outcome;
            }
            debug!(
                "Escalating {} to {} candidate {} (retry {})",
                candidate.url,
                next.tier,
                next.url,
                retry + 1
            );
            candidate = next;
            retry += 1;
            next_index += 1;
        }
    }

    /// Fetch exactly one candidate without escalating
    pub async fn fetch_candidate(&self, candidate: &SourceCandidate) -> FetchOutcome {
        if candidate.tier == SourceTier::Local || assets::is_local_asset(&candidate.url) {
            return FetchOutcome::Failed {
                url: candidate.url.clone(),
            };
        }

        let target = if candidate.tier.is_proxy() || self.resolver.is_proxy_url(&candidate.url) {
            let endpoint = self.absolute_proxy_url(&candidate.url);
            match proxy::resolve_proxy(self.transport.as_ref(), &endpoint).await {
                Ok(image) => match image.image_url() {
                    Some(url) => url.to_string(),
                    None => return FetchOutcome::ProxyFailed(endpoint),
                },
                Err(e) => {
                    warn!("Image proxy failed: {}", e);
                    return FetchOutcome::ProxyFailed(e.to_string());
                }
            }
        } else {
            candidate.url.clone()
        };

        self.fetch_direct(&target, candidate.tier).await
    }

    async fn fetch_direct(&self, url: &str, tier: SourceTier) -> FetchOutcome {
        for variant in url_variants(url) {
            for mode in RequestMode::ALL {
                match self.transport.get(&variant, mode).await {
                    Ok(response) if response.is_overloaded() => {
                        debug!("{} answered {}, escalating", variant, response.status);
                        return FetchOutcome::ServiceUnavailable {
                            url: url.to_string(),
                            status: response.status,
                        };
                    }
                    Ok(response) if response.is_success() => {
                        if response.body.is_empty() {
                            debug!("Empty body from {} ({:?})", variant, mode);
                            continue;
                        }
                        if !mime::is_plausible_image(response.mime(), &response.body) {
                            debug!(
                                "Non-image body from {} ({:?}, {:?})",
                                variant,
                                mode,
                                response.mime()
                            );
                            continue;
                        }

                        let mime_type = mime::resolve(response.mime(), &response.body);
                        let provenance = self.resolver.provenance_of(url, tier);
                        debug!(
                            "Fetched {} bytes of {} from {} ({:?})",
                            response.body.len(),
                            mime_type,
                            variant,
                            mode
                        );
                        return FetchOutcome::Fetched(FetchedBlob {
                            url: url.to_string(),
                            blob: ImageBlob {
                                bytes: response.body,
                                mime_type,
                                provenance,
                            },
                        });
                    }
                    Ok(response) => {
                        debug!("HTTP {} from {} ({:?})", response.status, variant, mode);
                    }
                    Err(e @ ImgCacheError::Timeout { .. }) => {
                        // A host that timed out will not answer another variant in time
                        debug!("{}", e);
                        return FetchOutcome::Failed {
                            url: url.to_string(),
                        };
                    }
                    Err(e) if e.is_retryable() => {
                        debug!("{} ({:?})", e, mode);
                    }
                    Err(e) => {
                        warn!("Giving up on {}: {}", variant, e);
                        return FetchOutcome::Failed {
                            url: url.to_string(),
                        };
                    }
                }
            }
        }

        FetchOutcome::Failed {
            url: url.to_string(),
        }
    }

    /// Proxy URLs may be relative to the configured proxy base
    fn absolute_proxy_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!(
                "{}{}",
                self.resolver.config().proxy_base.trim_end_matches('/'),
                url
            )
        } else {
            url.to_string()
        }
    }
}
