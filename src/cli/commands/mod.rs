//! CLI command implementations

pub mod clear;
pub mod config;
pub mod evict;
pub mod get;
pub mod invalidate;
pub mod list;
pub mod probe;
pub mod resolve;

pub use clear::execute as clear;
pub use config::execute as config;
pub use evict::execute as evict;
pub use get::execute as get;
pub use invalidate::execute as invalidate;
pub use list::execute as list;
pub use probe::execute as probe;
pub use resolve::execute as resolve;

use crate::error::{ImgCacheError, ImgCacheResult};
use std::path::Path;
use tokio::fs;

/// Write image bytes to a user-supplied path
async fn write_output(path: &Path, bytes: &[u8]) -> ImgCacheResult<()> {
    fs::write(path, bytes)
        .await
        .map_err(|e| ImgCacheError::io(format!("writing {}", path.display()), e))
}
