//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Deploycache - deployment cache orchestrator
///
/// Restores the cache units a deployment depends on, runs the deployment,
/// saves what it built and exports the search paths it declared.
#[derive(Parser, Debug)]
#[command(name = "deploycache")]
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
    #[arg(short, long, global = true, env = "DEPLOYCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .deploycache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore, deploy, persist and export paths for one deployment
    Run(RunArgs),

    /// Print the cache units a deployment depends on
    Closure(ClosureArgs),

    /// Inspect or clear the local cache store
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Deployment to run
    pub deployment: String,

    /// Version suffix appended to every cache key
    #[arg(long, env = "DEPLOYCACHE_CACHE_VERSION")]
    pub cache_version: String,

    /// Directory holding one subdirectory per cache unit (default: from config)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Local cache store directory (default: from config)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Concurrent restores/saves (default: from config)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Append path entries to this file instead of printing them
    #[arg(long, env = "GITHUB_PATH")]
    pub github_path: Option<PathBuf>,
}

/// Arguments for the closure command
#[derive(Parser, Debug)]
pub struct ClosureArgs {
    /// Deployment to resolve
    pub deployment: String,

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
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List stored cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every stored cache entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
