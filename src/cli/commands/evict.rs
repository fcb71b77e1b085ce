//! Evict command - expiry sweep

use crate::cache::LocalImageCache;
use crate::cli::args::EvictArgs;
use crate::config::{Config, ConfigManager};
use crate::error::ImgCacheResult;
use crate::ui::{self, UiContext};
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Execute the evict command
pub async fn execute(args: EvictArgs, config: &Config) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let cache = LocalImageCache::open(&config.cache, &ConfigManager::store_dir(config)).await;

    let max_age = args
        .max_age_days
        .map(|days| DAY * days)
        .unwrap_or_else(|| cache.max_age());

    let removed = cache.evict_expired(max_age).await;
    ui::step_ok(&ctx, &format!("Evicted {} expired image(s)", removed));

    Ok(())
}
