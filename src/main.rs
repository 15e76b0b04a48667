//! Deploycache - deployment cache orchestrator
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use deploycache::cli::{Cli, Commands};
use deploycache::config::{Config, ConfigManager};
use deploycache::error::{DeployError, DeployResult};
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

async fn run() -> DeployResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| DeployError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    match local_config_path {
        Some(ref path) => debug!("Using local config: {}", path.display()),
        None => debug!("No local config in use"),
    }

    // Dispatch to command
    match cli.command {
        Commands::Run(args) => deploycache::cli::commands::run(args, &config).await,
        Commands::Closure(args) => deploycache::cli::commands::closure(args, &config).await,
        Commands::Cache(args) => deploycache::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            deploycache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG overrides. Logs go to stderr.
fn init_logging(verbose: u8, config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("deploycache=warn"),
        1 => EnvFilter::new("deploycache=info"),
        _ => EnvFilter::new("deploycache=debug"),
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
}
