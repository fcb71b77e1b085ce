//! Invalidate command - drop one entry after a display failure

use crate::cache::LocalImageCache;
use crate::cli::args::InvalidateArgs;
use crate::config::{Config, ConfigManager};
use crate::error::ImgCacheResult;
use crate::ui::{self, UiContext};

/// Execute the invalidate command
pub async fn execute(args: InvalidateArgs, config: &Config) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let cache = LocalImageCache::open(&config.cache, &ConfigManager::store_dir(config)).await;

    if cache.invalidate(&args.id).await {
        ui::step_ok(&ctx, &format!("Invalidated {}", args.id));
    } else {
        ui::step_info(&ctx, &format!("No cache entry for {}", args.id));
    }

    Ok(())
}
