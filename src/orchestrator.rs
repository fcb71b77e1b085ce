//! Image resolution orchestrator
//!
//! Turns a content id plus an optional hint URL into something
//! displayable. Resolution walks a fixed state machine:
//!
//! ```text
//! CheckCache -> hit ----------------------------------------> Done
//!            -> miss -> Resolve -> NextCandidate -> Fetch -> Persist -> Done
//!                                      ^             |
//!                                      +--- fail ----+
//!                                      exhausted -> FallbackDefault -> Done
//! ```
//!
//! Every path ends in `Done`; the worst case is the category's bundled
//! default asset.

use crate::assets::Category;
use crate::cache::{ImageHandle, LocalImageCache};
use crate::config::{Config, ConfigManager};
use crate::error::ImgCacheError;
use crate::fetch::{BlobFetcher, FetchOutcome, FetchedBlob, HttpTransport, UreqTransport};
use crate::source::{SourceCandidate, SourceResolver, SourceTier, PROXY_ATTEMPTS};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call resolution options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Skip the cache lookup and fetch fresh bytes
    pub force_refresh: bool,
    /// Category whose default asset is the last resort
    pub category: Category,
}

/// One item of a batch resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub id: String,
    pub hint: String,
    pub options: ResolveOptions,
}

impl ImageRequest {
    pub fn new(id: impl Into<String>, hint: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            hint: hint.into(),
            options: ResolveOptions {
                force_refresh: false,
                category,
            },
        }
    }
}

/// What a resolution produced
#[derive(Debug)]
pub enum ResolvedImage {
    /// Served from the local cache
    Cached(ImageHandle),
    /// Downloaded during this resolution
    Fetched(ImageHandle),
    /// Bundled default asset path
    LocalDefault(String),
}

impl ResolvedImage {
    /// Displayable URL, never empty
    pub fn url(&self) -> &str {
        match self {
            Self::Cached(handle) | Self::Fetched(handle) => handle.url(),
            Self::LocalDefault(path) => path,
        }
    }

    pub fn handle(&self) -> Option<&ImageHandle> {
        match self {
            Self::Cached(handle) | Self::Fetched(handle) => Some(handle),
            Self::LocalDefault(_) => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::LocalDefault(_))
    }

    /// Short label for where the image came from
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Cached(_) => "cache",
            Self::Fetched(_) => "network",
            Self::LocalDefault(_) => "default",
        }
    }
}

enum State {
    CheckCache,
    Resolve,
    NextCandidate,
    Fetch(SourceCandidate),
    Persist(FetchedBlob),
    FallbackDefault,
    Done(ResolvedImage),
}

/// Coordinates the resolver, fetcher and cache
pub struct CacheOrchestrator {
    resolver: Arc<SourceResolver>,
    fetcher: BlobFetcher,
    cache: LocalImageCache,
    max_retries: u32,
    min_valid_bytes: u64,
    resolve_timeout: Duration,
    local_only: bool,
}

impl CacheOrchestrator {
    pub fn new(config: &Config, transport: Arc<dyn HttpTransport>, cache: LocalImageCache) -> Self {
        let resolver = Arc::new(SourceResolver::new(config.sources.clone()));
        let fetcher = BlobFetcher::new(transport, resolver.clone(), config.fetch.max_retries);

        Self {
            resolver,
            fetcher,
            cache,
            max_retries: config.fetch.max_retries,
            min_valid_bytes: config.cache.min_valid_bytes,
            resolve_timeout: config.fetch.resolve_timeout(),
            local_only: config.sources.use_local_images_only,
        }
    }

    /// Production wiring: `ureq` transport and the disk cache
    pub async fn from_config(config: &Config) -> Self {
        let transport = Arc::new(UreqTransport::new(&config.fetch));
        let cache = LocalImageCache::open(&config.cache, &ConfigManager::store_dir(config)).await;
        Self::new(config, transport, cache)
    }

    pub fn cache(&self) -> &LocalImageCache {
        &self.cache
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &BlobFetcher {
        &self.fetcher
    }

    /// Once-per-session expiry sweep
    pub async fn prepare(&self) -> usize {
        self.cache.evict_expired(self.cache.max_age()).await
    }

    /// Resolve one image; always yields a displayable result
    pub async fn resolve_image(&self, id: &str, hint: &str, options: ResolveOptions) -> ResolvedImage {
        match tokio::time::timeout(self.resolve_timeout, self.run(id, hint, options)).await {
            Ok(resolved) => resolved,
            Err(_) => {
                warn!(
                    "Resolving {} timed out after {} ms, using default",
                    id,
                    self.resolve_timeout.as_millis()
                );
                ResolvedImage::LocalDefault(options.category.default_asset().to_string())
            }
        }
    }

    /// The displayed image failed to load: drop its entry and fetch anew
    pub async fn report_load_failure(&self, id: &str, hint: &str, category: Category) -> ResolvedImage {
        info!("Display of {} failed, refreshing", id);
        self.cache.invalidate(id).await;
        self.resolve_image(
            id,
            hint,
            ResolveOptions {
                force_refresh: true,
                category,
            },
        )
        .await
    }

    /// Resolve several ids concurrently, results in request order
    pub async fn resolve_many(&self, requests: &[ImageRequest]) -> Vec<ResolvedImage> {
        join_all(
            requests
                .iter()
                .map(|r| self.resolve_image(&r.id, &r.hint, r.options)),
        )
        .await
    }

    async fn run(&self, id: &str, hint: &str, options: ResolveOptions) -> ResolvedImage {
        let budget = self.max_retries + 1;
        let mut hint_candidate: Option<SourceCandidate> = None;
        let mut attempt: u32 = 0;
        let mut used: u32 = 0;

        let mut state = if options.force_refresh {
            State::Resolve
        } else {
            State::CheckCache
        };

        loop {
            state = match state {
                State::CheckCache => match self.cache.get(id, true).await {
                    Some(handle) => {
                        debug!("Cache hit for {}", id);
                        State::Done(ResolvedImage::Cached(handle))
                    }
                    None if self.local_only => State::FallbackDefault,
                    None => State::Resolve,
                },

                State::Resolve => {
                    if self.local_only {
                        State::FallbackDefault
                    } else {
                        hint_candidate = self.resolver.hint_candidate(hint);
                        State::NextCandidate
                    }
                }

                State::NextCandidate => {
                    if let Some(candidate) = hint_candidate.take() {
                        State::Fetch(candidate)
                    } else if used >= budget {
                        debug!("Sources exhausted for {} after {} attempt(s)", id, used);
                        State::FallbackDefault
                    } else {
                        let candidate = self.resolver.next_candidate(hint, attempt);
                        attempt += 1;
                        used += 1;
                        if candidate.tier == SourceTier::Local {
                            State::FallbackDefault
                        } else {
                            State::Fetch(candidate)
                        }
                    }
                }

                State::Fetch(candidate) => {
                    debug!("Trying {} source for {}: {}", candidate.tier, id, candidate.url);
                    match self.fetcher.fetch_candidate(&candidate).await {
                        FetchOutcome::Fetched(fetched)
                            if (fetched.blob.len() as u64) < self.min_valid_bytes =>
                        {
                            let rejected = ImgCacheError::PayloadTooSmall {
                                url: fetched.url,
                                size: fetched.blob.len() as u64,
                                min: self.min_valid_bytes,
                            };
                            debug!("{}, escalating", rejected);
                            State::NextCandidate
                        }
                        FetchOutcome::Fetched(fetched) => State::Persist(fetched),
                        FetchOutcome::ServiceUnavailable { url, status } => {
                            debug!("{} unavailable ({}), escalating", url, status);
                            State::NextCandidate
                        }
                        FetchOutcome::ProxyFailed(reason) => {
                            if candidate.tier.is_proxy() {
                                debug!("Proxy failed ({}), moving to backups", reason);
                                attempt = attempt.max(PROXY_ATTEMPTS);
                            }
                            State::NextCandidate
                        }
                        FetchOutcome::Failed { url } => {
                            debug!("No usable response from {}", url);
                            State::NextCandidate
                        }
                    }
                }

                State::Persist(fetched) => {
                    let handle = if self.cache.put(id, &fetched.url, &fetched.blob).await {
                        self.cache.get(id, true).await
                    } else {
                        None
                    };
                    let handle = handle.unwrap_or_else(|| self.cache.adopt(id, &fetched.blob));
                    State::Done(ResolvedImage::Fetched(handle))
                }

                State::FallbackDefault => {
                    debug!("Using {} default for {}", options.category, id);
                    State::Done(ResolvedImage::LocalDefault(
                        options.category.default_asset().to_string(),
                    ))
                }

                State::Done(resolved) => return resolved,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImgCacheResult;
    use crate::fetch::mock::MockTransport;
    use crate::fetch::{HttpResponse, RequestMode};
    use crate::store::{CacheEntry, ImageBlob, ImageStore, MemoryStore, Provenance};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    const PROXY: &str = "http://localhost:3000/api/image";

    fn orchestrator_with(
        config: Config,
        transport: MockTransport,
    ) -> (CacheOrchestrator, Arc<MockTransport>, Arc<MemoryStore>) {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStore::new());
        let cache = LocalImageCache::new(store.clone(), &config.cache);
        let orchestrator = CacheOrchestrator::new(&config, transport.clone(), cache);
        (orchestrator, transport, store)
    }

    fn orchestrator(
        transport: MockTransport,
    ) -> (CacheOrchestrator, Arc<MockTransport>, Arc<MemoryStore>) {
        orchestrator_with(Config::default(), transport)
    }

    fn category(category: Category) -> ResolveOptions {
        ResolveOptions {
            force_refresh: false,
            category,
        }
    }

    #[tokio::test]
    async fn all_sources_failing_yields_category_default() {
        let (orch, _transport, store) = orchestrator(MockTransport::new());

        let resolved = orch
            .resolve_image("art-1", "https://cdn.example.com/a.jpg", category(Category::Video))
            .await;

        assert!(resolved.is_default());
        assert_eq!(resolved.url(), "/images/video-default.svg");
        assert!(store.get("art-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetched_image_is_cached() {
        let (orch, _transport, store) =
            orchestrator(MockTransport::new().image("https://cdn.example.com/", 500));

        let resolved = orch
            .resolve_image("art-2", "https://cdn.example.com/a.jpg", ResolveOptions::default())
            .await;

        assert_eq!(resolved.origin(), "network");
        assert_eq!(resolved.handle().unwrap().len(), 500);
        let entry = store.get("art-2").await.unwrap().unwrap();
        assert_eq!(entry.meta.size_bytes, 500);
        assert_eq!(entry.meta.source_url, "https://cdn.example.com/a.jpg");
    }

    #[tokio::test]
    async fn second_resolution_hits_the_cache() {
        let (orch, transport, _store) =
            orchestrator(MockTransport::new().image("https://cdn.example.com/", 500));
        let hint = "https://cdn.example.com/a.jpg";

        drop(orch.resolve_image("art-2", hint, ResolveOptions::default()).await);
        let calls = transport.calls().len();

        let resolved = orch.resolve_image("art-2", hint, ResolveOptions::default()).await;
        assert_eq!(resolved.origin(), "cache");
        assert_eq!(transport.calls().len(), calls);

        let refreshed = orch
            .resolve_image(
                "art-2",
                hint,
                ResolveOptions {
                    force_refresh: true,
                    category: Category::Llm,
                },
            )
            .await;
        assert_eq!(refreshed.origin(), "network");
        assert!(transport.calls().len() > calls);
    }

    #[tokio::test]
    async fn overloaded_hint_escalates_to_next_candidate() {
        let (orch, transport, store) = orchestrator(
            MockTransport::new()
                .status("https://cdn.example.com/busy", 429)
                .json(PROXY, json!({ "url": "https://cdn.example.com/p.jpg" }))
                .image("https://cdn.example.com/p", 400),
        );

        let resolved = orch
            .resolve_image("art-4", "https://cdn.example.com/busy.jpg", ResolveOptions::default())
            .await;

        assert_eq!(resolved.origin(), "network");
        assert_eq!(transport.calls_to("https://cdn.example.com/busy"), 1);
        let entry = store.get("art-4").await.unwrap().unwrap();
        assert_eq!(entry.meta.source_url, "https://cdn.example.com/p.jpg");
        assert_eq!(entry.meta.provenance, Provenance::Original);
    }

    #[tokio::test]
    async fn failed_proxy_jumps_to_backups() {
        let (orch, transport, store) = orchestrator(
            MockTransport::new()
                .status(PROXY, 503)
                .image("https://images.unsplash.com/", 300),
        );

        let resolved = orch.resolve_image("art-5", "", ResolveOptions::default()).await;

        assert_eq!(resolved.origin(), "network");
        assert_eq!(transport.calls_to(PROXY), 1);
        let entry = store.get("art-5").await.unwrap().unwrap();
        assert_eq!(entry.meta.provenance, Provenance::Backup);
        assert!(entry
            .meta
            .source_url
            .starts_with("https://images.unsplash.com/random/800x600?"));
    }

    #[tokio::test]
    async fn undersized_payload_escalates() {
        let (orch, _transport, store) = orchestrator(
            MockTransport::new()
                .image("https://cdn.example.com/", 50)
                .image("https://loremflickr.com/", 300),
        );

        let resolved = orch
            .resolve_image("art-3", "https://cdn.example.com/tiny.jpg", ResolveOptions::default())
            .await;

        assert_eq!(resolved.origin(), "network");
        let entry = store.get("art-3").await.unwrap().unwrap();
        assert!(entry.meta.source_url.starts_with("https://loremflickr.com/800/600/technology"));
        assert_eq!(entry.meta.size_bytes, 300);
    }

    #[tokio::test]
    async fn unstable_hint_is_not_requested() {
        let (orch, transport, _store) = orchestrator(MockTransport::new());

        let resolved = orch
            .resolve_image("art-6", "https://picsum.photos/800/600", ResolveOptions::default())
            .await;

        assert!(resolved.is_default());
        assert_eq!(transport.calls_to("https://picsum.photos/"), 0);
        assert!(transport.calls()[0].starts_with(PROXY));
    }

    #[tokio::test]
    async fn local_only_mode_never_touches_the_network() {
        let mut config = Config::default();
        config.sources.use_local_images_only = true;
        let (orch, transport, store) = orchestrator_with(config, MockTransport::new());

        let resolved = orch
            .resolve_image("a", "https://cdn.example.com/a.jpg", category(Category::Audio))
            .await;
        assert_eq!(resolved.url(), "/images/audio-default.svg");
        assert!(transport.calls().is_empty());

        store
            .put(CacheEntry::new("b", "https://cdn.example.com/b.jpg", &ImageBlob::new(vec![1; 200])))
            .await
            .unwrap();
        let cached = orch.resolve_image("b", "", ResolveOptions::default()).await;
        assert_eq!(cached.origin(), "cache");
    }

    #[tokio::test]
    async fn load_failure_refetches() {
        let (orch, transport, store) =
            orchestrator(MockTransport::new().image("https://cdn.example.com/", 500));
        let hint = "https://cdn.example.com/a.jpg";

        drop(orch.resolve_image("art-7", hint, ResolveOptions::default()).await);
        let calls = transport.calls().len();

        let resolved = orch.report_load_failure("art-7", hint, Category::Coding).await;
        assert_eq!(resolved.origin(), "network");
        assert!(transport.calls().len() > calls);
        assert!(store.get("art-7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn prepare_sweeps_expired_entries() {
        let (orch, _transport, store) = orchestrator(MockTransport::new());
        let old = Utc::now().timestamp_millis() - 8 * 24 * 60 * 60 * 1000;
        store
            .put(CacheEntry::at("old", "https://cdn.example.com/o.jpg", &ImageBlob::new(vec![1; 200]), old))
            .await
            .unwrap();
        store
            .put(CacheEntry::new("new", "https://cdn.example.com/n.jpg", &ImageBlob::new(vec![1; 200])))
            .await
            .unwrap();

        assert_eq!(orch.prepare().await, 1);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resolve_many_keeps_request_order() {
        let (orch, _transport, _store) =
            orchestrator(MockTransport::new().image("https://cdn.example.com/", 200));

        let requests = vec![
            ImageRequest::new("a", "https://cdn.example.com/a.jpg", Category::Llm),
            ImageRequest::new("b", "", Category::Coding),
        ];
        let resolved = orch.resolve_many(&requests).await;

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].handle().unwrap().id(), "a");
        assert_eq!(resolved[1].url(), "/images/coding-default.svg");
        assert_eq!(orch.cache().live_handles(), 1);

        drop(resolved);
        assert_eq!(orch.cache().live_handles(), 0);
    }

    #[tokio::test]
    async fn unavailable_store_still_returns_fetched_bytes() {
        let config = Config::default();
        let transport = Arc::new(MockTransport::new().image("https://cdn.example.com/", 300));
        let orch = CacheOrchestrator::new(&config, transport, LocalImageCache::disabled());

        let resolved = orch
            .resolve_image("x", "https://cdn.example.com/a.jpg", ResolveOptions::default())
            .await;
        assert_eq!(resolved.origin(), "network");
        assert_eq!(resolved.handle().unwrap().len(), 300);
    }

    struct StalledTransport;

    #[async_trait]
    impl HttpTransport for StalledTransport {
        async fn get(&self, _url: &str, _mode: RequestMode) -> ImgCacheResult<HttpResponse> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(HttpResponse::new(200, Some("image/jpeg"), vec![0xFF; 500]))
        }
    }

    #[tokio::test]
    async fn deadline_yields_default() {
        let mut config = Config::default();
        config.fetch.resolve_timeout_ms = 50;
        let cache = LocalImageCache::new(Arc::new(MemoryStore::new()), &config.cache);
        let orch = CacheOrchestrator::new(&config, Arc::new(StalledTransport), cache);

        let resolved = orch
            .resolve_image("slow", "https://cdn.example.com/a.jpg", category(Category::Coding))
            .await;
        assert_eq!(resolved.url(), "/images/coding-default.svg");
    }
}
