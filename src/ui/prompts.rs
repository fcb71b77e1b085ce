//! Confirmation prompts

use super::context::UiContext;
use crate::error::{ImgCacheError, ImgCacheResult};

/// Ask for confirmation
///
/// `--yes` approves, a non-interactive session gets `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ImgCacheResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
    .map_err(|e| ImgCacheError::Internal(format!("prompt task failed: {}", e)))?
    .map_err(|e| ImgCacheError::User(format!("Prompt failed: {}", e)))
}
