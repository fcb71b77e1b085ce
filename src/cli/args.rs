//! CLI argument definitions using clap derive

use crate::assets::Category;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// imgcache - resolve, fetch and cache article images
///
/// Walks a chain of image sources with fallbacks and keeps what it fetched
/// in a local cache, so images still show when the network does not.
#[derive(Parser, Debug)]
#[command(name = "imgcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "IMGCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image store directory (overrides [cache] dir)
    #[arg(long, global = true, env = "IMGCACHE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an image for a content id, fetching and caching as needed
    Resolve(ResolveArgs),

    /// Look up a cached image without touching the network
    Get(GetArgs),

    /// Remove cache entries older than the max age
    Evict(EvictArgs),

    /// Drop the cache entry for one content id
    Invalidate(InvalidateArgs),

    /// List cached images
    List(ListArgs),

    /// Remove every cached image
    Clear(ClearArgs),

    /// Check that the image proxy answers with an image URL
    Probe(ProbeArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Content id (article or project)
    pub id: String,

    /// Preferred image URL for this content
    #[arg(default_value = "")]
    pub hint: String,

    /// Category whose default image is the last resort
    #[arg(long, value_enum, default_value_t = Category::Llm)]
    pub category: Category,

    /// Ignore any cached entry and fetch fresh bytes
    #[arg(short, long)]
    pub force_refresh: bool,

    /// The previously displayed image failed to load; refetch it
    #[arg(long, conflicts_with = "force_refresh")]
    pub load_failed: bool,

    /// Write the image bytes to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Content id
    pub id: String,

    /// Return undersized entries too
    #[arg(long)]
    pub no_validate: bool,

    /// Write the image bytes to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the evict command
#[derive(Parser, Debug)]
pub struct EvictArgs {
    /// Remove entries older than N days (default: from config)
    #[arg(long)]
    pub max_age_days: Option<u32>,
}

/// Arguments for the invalidate command
#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    /// Content id
    pub id: String,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the probe command
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Topic keyword passed through to the proxy
    #[arg(short, long)]
    pub query: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., sources.proxy_base)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
