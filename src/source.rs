//! Image source resolution
//!
//! Produces the ordered fallback chain for one image: the caller's own
//! hint, the random-image proxy, keyword-seeded proxy variants, then the
//! ranked backup services. Hosts in the unstable set are never tried first.

use crate::assets::{self, Category};
use crate::config::schema::SourcesConfig;
use crate::store::Provenance;
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use url::form_urlencoded;

/// Proxy attempts (one random plus the keyword variants) before backups
pub const PROXY_ATTEMPTS: u32 = 4;

/// Where a candidate URL comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTier {
    /// The caller's own hint URL
    Original,
    /// Hint URL hosted on the configured primary source
    Primary,
    /// Proxy endpoint, random image
    ProxyRandom,
    /// Proxy endpoint with a topic keyword
    ProxyKeyword,
    /// Backup service by 1-based rank
    Backup(u32),
    /// Bundled local asset
    Local,
}

impl SourceTier {
    /// Whether candidates of this tier go through the proxy endpoint
    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::ProxyRandom | Self::ProxyKeyword)
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Primary => write!(f, "primary"),
            Self::ProxyRandom => write!(f, "proxy-random"),
            Self::ProxyKeyword => write!(f, "proxy-keyword"),
            Self::Backup(rank) => write!(f, "backup-{}", rank),
            Self::Local => write!(f, "local"),
        }
    }
}

/// One URL to try, regenerated for every resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub url: String,
    pub tier: SourceTier,
}

impl SourceCandidate {
    pub fn new(url: impl Into<String>, tier: SourceTier) -> Self {
        Self {
            url: url.into(),
            tier,
        }
    }
}

/// URL convention of a backup service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackupStyle {
    /// `{base}/{w}/{h}/technology?random={bust}`
    LoremFlickr,
    /// `{base}/{w}/{h}?{bust}`
    PlaceKitten,
    /// `{base}/random/{w}x{h}?{bust}`
    Generic,
}

impl BackupStyle {
    fn detect(base: &str) -> Self {
        if base.contains("loremflickr.com") {
            Self::LoremFlickr
        } else if base.contains("placekitten.com") {
            Self::PlaceKitten
        } else {
            Self::Generic
        }
    }

    fn format(&self, base: &str, width: u32, height: u32, bust: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            Self::LoremFlickr => format!("{}/{}/{}/technology?random={}", base, width, height, bust),
            Self::PlaceKitten => format!("{}/{}/{}?{}", base, width, height, bust),
            Self::Generic => format!("{}/random/{}x{}?{}", base, width, height, bust),
        }
    }
}

/// Fresh cache-busting value: epoch millis plus a per-process sequence
pub fn cache_bust() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{}{:03}", Utc::now().timestamp_millis(), seq)
}

/// Resolves hints into ordered source candidates
#[derive(Debug, Clone)]
pub struct SourceResolver {
    config: SourcesConfig,
}

impl SourceResolver {
    pub fn new(config: SourcesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourcesConfig {
        &self.config
    }

    /// Whether a URL belongs to a known-unstable image host
    pub fn is_unstable(&self, url: &str) -> bool {
        self.config
            .unstable_sources
            .iter()
            .any(|source| !source.is_empty() && url.contains(source.as_str()))
    }

    /// Whether a URL addresses the proxy endpoint (relative or absolute)
    pub fn is_proxy_url(&self, url: &str) -> bool {
        let path_part = url.split(['?', '#']).next().unwrap_or(url);
        let path = self.config.proxy_path.as_str();
        if path_part == path {
            return true;
        }
        let base = self.config.proxy_base.trim_end_matches('/');
        !base.is_empty() && path_part == format!("{}{}", base, path)
    }

    /// Whether the caller's hint is worth trying before the resolver chain
    pub fn is_usable_hint(&self, hint: &str) -> bool {
        (hint.starts_with("https://") || hint.starts_with("http://"))
            && !assets::is_placeholder(hint)
            && !self.is_unstable(hint)
    }

    /// Provenance tag for a URL that produced a payload
    pub fn provenance_of(&self, url: &str, tier: SourceTier) -> Provenance {
        match tier {
            SourceTier::Primary => Provenance::Primary,
            SourceTier::Backup(_) => Provenance::Backup,
            _ if self.is_primary(url) => Provenance::Primary,
            _ if self.is_backup(url) => Provenance::Backup,
            _ => Provenance::Original,
        }
    }

    fn is_primary(&self, url: &str) -> bool {
        let primary = self.config.primary_source.trim_end_matches('/');
        !primary.is_empty() && url.starts_with(primary)
    }

    fn is_backup(&self, url: &str) -> bool {
        self.config
            .backup_sources
            .iter()
            .map(|s| s.trim_end_matches('/'))
            .any(|s| !s.is_empty() && url.starts_with(s))
    }

    /// Candidate for the hint itself, if it should be tried at all
    pub fn hint_candidate(&self, hint: &str) -> Option<SourceCandidate> {
        if self.config.use_local_images_only {
            return None;
        }
        if self.is_unstable(hint) {
            debug!("Hint {} is on an unstable source, restarting at attempt 0", hint);
            return None;
        }
        if !self.is_usable_hint(hint) {
            return None;
        }
        let tier = if self.is_primary(hint) {
            SourceTier::Primary
        } else {
            SourceTier::Original
        };
        Some(SourceCandidate::new(hint, tier))
    }

    /// Candidate for a given attempt index
    ///
    /// Never fails: indices past the backup list wrap around it.
    pub fn next_candidate(&self, hint: &str, attempt_index: u32) -> SourceCandidate {
        if self.config.use_local_images_only {
            let category = Category::rotate(attempt_index);
            return SourceCandidate::new(category.default_asset(), SourceTier::Local);
        }

        if attempt_index == 0 && self.is_unstable(hint) {
            debug!("Unstable hint {}, using proxy instead", hint);
        }

        if attempt_index < PROXY_ATTEMPTS {
            return self.proxy_candidate(attempt_index);
        }

        self.backup_candidate(attempt_index - PROXY_ATTEMPTS)
    }

    /// The full chain the orchestrator walks: hint first, then
    /// `attempts` resolver candidates
    pub fn initial_candidates(&self, hint: &str, attempts: u32) -> Vec<SourceCandidate> {
        self.hint_candidate(hint)
            .into_iter()
            .chain((0..attempts).map(|i| self.next_candidate(hint, i)))
            .collect()
    }

    fn proxy_candidate(&self, index: u32) -> SourceCandidate {
        let keyword = match index {
            0 => None,
            n => self.config.keyword_hints.get(n as usize - 1),
        };
        match keyword {
            Some(keyword) => {
                SourceCandidate::new(self.proxy_url(Some(keyword)), SourceTier::ProxyKeyword)
            }
            None => SourceCandidate::new(self.proxy_url(None), SourceTier::ProxyRandom),
        }
    }

    /// Proxy endpoint URL, optionally carrying a topic keyword
    pub fn proxy_url(&self, query: Option<&str>) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        if let Some(query) = query {
            params.append_pair("query", query);
        }
        params.append_pair("w", &self.config.width.to_string());
        params.append_pair("h", &self.config.height.to_string());

        format!(
            "{}{}?{}",
            self.config.proxy_base.trim_end_matches('/'),
            self.config.proxy_path,
            params.finish()
        )
    }

    fn backup_candidate(&self, offset: u32) -> SourceCandidate {
        let usable: Vec<(usize, &String)> = self
            .config
            .backup_sources
            .iter()
            .enumerate()
            .filter(|(_, base)| !base.is_empty() && !self.is_unstable(base))
            .collect();

        if usable.is_empty() {
            return self.proxy_candidate(offset % PROXY_ATTEMPTS);
        }

        let (rank, base) = usable[offset as usize % usable.len()];
        let url = BackupStyle::detect(base).format(
            base,
            self.config.width,
            self.config.height,
            &cache_bust(),
        );
        SourceCandidate::new(url, SourceTier::Backup(rank as u32 + 1))
    }
}
