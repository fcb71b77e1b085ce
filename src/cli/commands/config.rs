//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{ImgCacheError, ImgCacheResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: [&str; 18] = [
    "general.log_format",
    "sources.use_local_images_only",
    "sources.proxy_base",
    "sources.proxy_path",
    "sources.width",
    "sources.height",
    "sources.primary_source",
    "sources.keyword_hints",
    "sources.backup_sources",
    "sources.unstable_sources",
    "cache.enabled",
    "cache.max_age_ms",
    "cache.min_valid_bytes",
    "cache.dir",
    "fetch.max_retries",
    "fetch.request_timeout_ms",
    "fetch.resolve_timeout_ms",
    "fetch.user_agent",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> ImgCacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> ImgCacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok(&ctx, &format!("Configuration initialized at {}", path.display()));

    Ok(())
}

/// Update one key in the file on disk, leaving CLI overrides out of it
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;
    apply(&mut config, key, value)?;
    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> ImgCacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = value.to_string(),

        ["sources", "use_local_images_only"] => {
            config.sources.use_local_images_only = parse_bool(value)?
        }
        ["sources", "proxy_base"] => config.sources.proxy_base = value.to_string(),
        ["sources", "proxy_path"] => config.sources.proxy_path = value.to_string(),
        ["sources", "width"] => config.sources.width = parse_number(value)?,
        ["sources", "height"] => config.sources.height = parse_number(value)?,
        ["sources", "primary_source"] => config.sources.primary_source = value.to_string(),
        // keywords may themselves contain commas ("training,model")
        ["sources", "keyword_hints"] => config.sources.keyword_hints = parse_list(value, ';'),
        ["sources", "backup_sources"] => config.sources.backup_sources = parse_list(value, ','),
        ["sources", "unstable_sources"] => {
            config.sources.unstable_sources = parse_list(value, ',')
        }

        ["cache", "enabled"] => config.cache.enabled = parse_bool(value)?,
        ["cache", "max_age_ms"] => config.cache.max_age_ms = parse_number(value)?,
        ["cache", "min_valid_bytes"] => config.cache.min_valid_bytes = parse_number(value)?,
        ["cache", "dir"] => {
            config.cache.dir = Some(value)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        }

        ["fetch", "max_retries"] => config.fetch.max_retries = parse_number(value)?,
        ["fetch", "request_timeout_ms"] => config.fetch.request_timeout_ms = parse_number(value)?,
        ["fetch", "resolve_timeout_ms"] => config.fetch.resolve_timeout_ms = parse_number(value)?,
        ["fetch", "user_agent"] => config.fetch.user_agent = value.to_string(),

        _ => {
            return Err(ImgCacheError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

fn parse_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> ImgCacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ImgCacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ImgCacheResult<T> {
    value
        .parse()
        .map_err(|_| ImgCacheError::User(format!("Invalid number: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn apply_known_keys() {
        let mut config = Config::default();
        apply(&mut config, "sources.use_local_images_only", "yes").unwrap();
        apply(&mut config, "sources.keyword_hints", "training,model; space").unwrap();
        apply(&mut config, "fetch.max_retries", "5").unwrap();
        apply(&mut config, "cache.dir", "/tmp/images").unwrap();
        apply(&mut config, "fetch.user_agent", "portfolio-bot/2").unwrap();

        assert!(config.sources.use_local_images_only);
        assert_eq!(config.sources.keyword_hints, vec!["training,model", "space"]);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/images")));
        assert_eq!(config.fetch.user_agent, "portfolio-bot/2");

        apply(&mut config, "cache.dir", "").unwrap();
        assert_eq!(config.cache.dir, None);
    }

    #[test]
    fn apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "vm.name", "x").is_err());
        assert!(apply(&mut config, "cache.enabled", "maybe").is_err());
        assert!(apply(&mut config, "sources.width", "-1").is_err());
    }

    #[tokio::test]
    async fn set_value_persists() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));

        set_value(&manager, "sources.proxy_base", "http://127.0.0.1:8080")
            .await
            .unwrap();

        let config = manager.load().await.unwrap();
        assert_eq!(config.sources.proxy_base, "http://127.0.0.1:8080");
    }
}
