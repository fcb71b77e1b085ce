//! Resolve command - run the full fallback chain for one content id

use super::write_output;
use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::ImgCacheResult;
use crate::orchestrator::{CacheOrchestrator, ResolveOptions};
use crate::ui::{TaskSpinner, UiContext};
use tracing::{info, warn};

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let orchestrator = CacheOrchestrator::from_config(config).await;
    orchestrator.prepare().await;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving image for {}", args.id));

    let resolved = if args.load_failed {
        orchestrator
            .report_load_failure(&args.id, &args.hint, args.category)
            .await
    } else {
        let options = ResolveOptions {
            force_refresh: args.force_refresh,
            category: args.category,
        };
        orchestrator
            .resolve_image(&args.id, &args.hint, options)
            .await
    };

    spinner.stop(&format!("Resolved {} from {}", args.id, resolved.origin()));

    if let Some(path) = &args.output {
        match resolved.handle() {
            Some(handle) => {
                write_output(path, handle.bytes()).await?;
                info!("Wrote {} bytes to {}", handle.len(), path.display());
            }
            None => warn!(
                "{} resolved to a bundled default, nothing written to {}",
                args.id,
                path.display()
            ),
        }
    }

    match resolved.handle() {
        Some(handle) => println!(
            "{}\t{}\t{}\t{}",
            resolved.origin(),
            handle.url(),
            handle.mime_type(),
            handle.len()
        ),
        None => println!("{}\t{}", resolved.origin(), resolved.url()),
    }

    Ok(())
}
