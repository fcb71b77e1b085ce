//! Clear command - remove every cached image

use crate::cache::LocalImageCache;
use crate::cli::args::ClearArgs;
use crate::config::{Config, ConfigManager};
use crate::error::ImgCacheResult;
use crate::ui::{self, UiContext};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> ImgCacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let cache = LocalImageCache::open(&config.cache, &ConfigManager::store_dir(config)).await;

    let count = cache.entries().await.len();
    if count == 0 {
        ui::step_info(&ctx, "Cache is already empty");
        return Ok(());
    }

    let prompt = format!("Remove {} cached image(s)?", count);
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::step_warn_hint(&ctx, "Nothing removed", "Pass --yes to clear without a prompt");
        return Ok(());
    }

    let removed = cache.clear().await;
    ui::step_ok(&ctx, &format!("Removed {} cached image(s)", removed));

    Ok(())
}
