//! imgcache - multi-source image resolution with a local image cache
//!
//! Resolves a displayable image for a piece of content by walking an
//! ordered chain of remote sources, caching what it fetched and falling
//! back to a bundled default when every source fails.

pub mod assets;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mime;
pub mod orchestrator;
pub mod source;
pub mod store;
pub mod ui;

pub use error::{ImgCacheError, ImgCacheResult};
pub use orchestrator::{CacheOrchestrator, ImageRequest, ResolveOptions, ResolvedImage};
