//! imgcache - image resolution and cache CLI
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use imgcache::cli::{Cli, Commands};
use imgcache::config::{Config, ConfigManager};
use imgcache::error::ImgCacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ImgCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // A broken config file must not block `config init --force`
    let mut config = match config_manager.load().await {
        Ok(config) => config,
        Err(e) if matches!(cli.command, Commands::Config(_)) => {
            eprintln!("{} {}", style("Warning:").yellow(), e);
            Config::default()
        }
        Err(e) => return Err(e),
    };

    if let Some(dir) = cli.store_dir.clone() {
        config.cache.dir = Some(dir);
    }

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Resolve(args) => imgcache::cli::commands::resolve(args, &config).await,
        Commands::Get(args) => imgcache::cli::commands::get(args, &config).await,
        Commands::Evict(args) => imgcache::cli::commands::evict(args, &config).await,
        Commands::Invalidate(args) => imgcache::cli::commands::invalidate(args, &config).await,
        Commands::List(args) => imgcache::cli::commands::list(args, &config).await,
        Commands::Clear(args) => imgcache::cli::commands::clear(args, &config).await,
        Commands::Probe(args) => imgcache::cli::commands::probe(args, &config).await,
        Commands::Config(args) => {
            imgcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("imgcache=warn"),
        1 => EnvFilter::new("imgcache=info"),
        _ => EnvFilter::new("imgcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
