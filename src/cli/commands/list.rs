//! List command - show cached images

use crate::cache::LocalImageCache;
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::ImgCacheResult;
use crate::store::EntryMeta;
use crate::ui::{self, UiContext};
use chrono::{DateTime, Utc};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> ImgCacheResult<()> {
    let cache = LocalImageCache::open(&config.cache, &ConfigManager::store_dir(config)).await;
    let entries = cache.entries().await;

    if entries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No cached images");
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&cache, &entries).await,
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.id);
            }
        }
    }

    Ok(())
}

async fn print_table(cache: &LocalImageCache, entries: &[EntryMeta]) {
    let ctx = UiContext::detect();
    ui::section(&ctx, "Cached images");

    println!(
        "{:<24} {:>10} {:<14} {:<9} {:<17} {}",
        style("ID").bold(),
        style("SIZE").bold(),
        style("TYPE").bold(),
        style("SOURCE").bold(),
        style("CACHED").bold(),
        style("URL").bold()
    );
    println!("{}", "-".repeat(100));

    let now = Utc::now().timestamp_millis();
    let max_age_ms = cache.max_age().as_millis();

    for entry in entries {
        let cached = DateTime::<Utc>::from_timestamp_millis(entry.timestamp_ms)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let cached = if u128::from(entry.age_ms(now)) > max_age_ms {
            style(cached).dim()
        } else {
            style(cached)
        };

        println!(
            "{:<24} {:>10} {:<14} {:<9} {:<17} {}",
            truncate(&entry.id, 24),
            entry.size_bytes,
            truncate(&entry.mime_type, 14),
            entry.provenance,
            cached,
            truncate(&entry.source_url, 60)
        );
    }

    let stats = cache.stats().await;
    println!();
    println!(
        "{} image(s), {} bytes, {} expired ({} store)",
        stats.entries, stats.total_bytes, stats.expired, stats.backend
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
