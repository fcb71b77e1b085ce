//! Get command - cache lookup only

use super::write_output;
use crate::cache::LocalImageCache;
use crate::cli::args::GetArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{ImgCacheError, ImgCacheResult};
use crate::ui::{self, UiContext};

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let cache = LocalImageCache::open(&config.cache, &ConfigManager::store_dir(config)).await;

    let handle = cache
        .get(&args.id, !args.no_validate)
        .await
        .ok_or_else(|| ImgCacheError::User(format!("No usable cache entry for {}", args.id)))?;

    if let Some(path) = &args.output {
        write_output(path, handle.bytes()).await?;
    }

    ui::key_value(&ctx, "Id", handle.id());
    ui::key_value(&ctx, "Type", handle.mime_type());
    ui::key_value(&ctx, "Size", &format!("{} bytes", handle.len()));
    if let Some(path) = &args.output {
        ui::key_value(&ctx, "Written to", &path.display().to_string());
    }

    Ok(())
}
