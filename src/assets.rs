//! Local default assets
//!
//! Every content category has one static image that is always resolvable.
//! These paths are the terminal fallback and never go through the fetch
//! pipeline or the cache.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by all bundled default images
pub const LOCAL_ASSET_PREFIX: &str = "/images/";

/// Content category of an article or project
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Llm,
    Coding,
    Audio,
    Video,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Llm,
        Category::Coding,
        Category::Audio,
        Category::Video,
    ];

    /// Static default image for this category
    pub fn default_asset(&self) -> &'static str {
        match self {
            Self::Llm => "/images/llm-default.svg",
            Self::Coding => "/images/coding-default.svg",
            Self::Audio => "/images/audio-default.svg",
            Self::Video => "/images/video-default.svg",
        }
    }

    /// Pick a category default by rotating index
    pub fn rotate(index: u32) -> Self {
        Self::ALL[index as usize % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Coding => "coding",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a URL points at a bundled local asset
pub fn is_local_asset(url: &str) -> bool {
    url.starts_with(LOCAL_ASSET_PREFIX)
        || (url.contains(LOCAL_ASSET_PREFIX) && url.ends_with("-default.svg"))
}

/// Whether a URL is a placeholder that must never be cached
pub fn is_placeholder(url: &str) -> bool {
    url.trim().is_empty() || is_local_asset(url) || url == "data:image/svg+xml;base64"
}
