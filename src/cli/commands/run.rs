//! Run command - orchestrate one deployment

use crate::cache::{CacheStore, LocalCacheStore};
use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::deployment::{CommandExecutor, CommandResolver};
use crate::error::DeployResult;
use crate::export::PathExport;
use crate::journal::RunJournal;
use crate::orchestrator::{Orchestrator, RunReport, RunRequest};
use console::style;
use std::sync::Arc;
use tracing::{debug, warn};

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> DeployResult<()> {
    let cache_dir = args.cache_dir.unwrap_or_else(|| config.cache.dir.clone());
    let store = LocalCacheStore::new(args.store_dir.unwrap_or_else(|| config.cache.store_dir()));
    let parallelism = args.jobs.unwrap_or(config.cache.parallelism);

    debug!(
        "Using {} cache store at {}",
        store.backend_name(),
        store.root().display()
    );

    let orchestrator = Orchestrator::new(
        Arc::new(CommandResolver::new(config.resolver.clone())),
        Arc::new(CommandExecutor::new(config.executor.clone())),
        Arc::new(store),
    )
    .with_parallelism(parallelism);

    let request = RunRequest {
        deployment: args.deployment,
        version_suffix: args.cache_version,
        cache_dir,
    };

    let journal = RunJournal::new(config);
    journal
        .log(
            "run.started",
            &serde_json::json!({
                "deployment": request.deployment,
                "cache_version": request.version_suffix,
                "cache_dir": request.cache_dir.display().to_string(),
            }),
        )
        .await;

    let report = match orchestrator.run(&request).await {
        Ok(report) => report,
        Err(e) => {
            journal
                .log(
                    "run.failed",
                    &serde_json::json!({
                        "deployment": request.deployment,
                        "stage": e.stage().map(|s| s.to_string()),
                        "error": e.to_string(),
                    }),
                )
                .await;
            return Err(e);
        }
    };

    let export = PathExport::from_target(args.github_path);
    if let Err(e) = export.apply(&report.path_entries).await {
        warn!("Failed to export path entries: {}", e);
    }

    journal
        .log(
            "run.completed",
            &serde_json::json!({
                "deployment": report.deployment,
                "hits": report.hits.hit_count(),
                "closure": report.closure.len(),
                "saved": report.saved.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                "path_entries": report.path_entries.len(),
                "warnings": report.warnings.len(),
            }),
        )
        .await;

    print_summary(&report);
    Ok(())
}

/// Summary goes to stderr; stdout may carry path entries
fn print_summary(report: &RunReport) {
    eprintln!(
        "{} {}: {}/{} unit(s) restored, {} saved, {} path entr(ies)",
        style("✓").green(),
        style(&report.deployment).bold(),
        report.hits.hit_count(),
        report.closure.len(),
        report.saved.len(),
        report.path_entries.len()
    );

    for name in &report.closure {
        let state = if report.hits.is_hit(name) {
            style("hit").green()
        } else {
            style("miss").dim()
        };
        eprintln!("  {} {:<32} {}", style("•").cyan(), name.as_str(), state);
    }

    for name in &report.skipped_marked {
        eprintln!("  {} {} not cached (marked)", style("○").dim(), name);
    }

    for warning in &report.warnings {
        eprintln!("  {} {}", style("!").yellow(), warning);
    }
}
