//! Closure command - print the cache units a deployment depends on

use crate::cache::CacheName;
use crate::cli::args::{ClosureArgs, OutputFormat};
use crate::config::Config;
use crate::deployment::{CommandResolver, DependencyResolver};
use crate::error::DeployResult;

/// Execute the closure command
pub async fn execute(args: ClosureArgs, config: &Config) -> DeployResult<()> {
    let resolver = CommandResolver::new(config.resolver.clone());
    let closure = resolver.closure(&args.deployment).await?;

    match args.format {
        OutputFormat::Table => print_closure_table(&args.deployment, &closure),
        OutputFormat::Json => print_closure_json(&closure)?,
        OutputFormat::Plain => print_closure_plain(&closure),
    }

    Ok(())
}

fn print_closure_table(deployment: &str, closure: &[CacheName]) {
    if closure.is_empty() {
        println!("Deployment {} needs no cache units.", deployment);
        return;
    }

    println!("{:<6} {:<40}", "ORDER", "UNIT");
    println!("{}", "-".repeat(46));
    for (i, name) in closure.iter().enumerate() {
        println!("{:<6} {:<40}", i + 1, name.as_str());
    }

    println!();
    println!("Total: {} unit(s)", closure.len());
}

fn print_closure_json(closure: &[CacheName]) -> DeployResult<()> {
    let names: Vec<&str> = closure.iter().map(CacheName::as_str).collect();
    println!("{}", serde_json::to_string_pretty(&names)?);
    Ok(())
}

fn print_closure_plain(closure: &[CacheName]) {
    for name in closure {
        println!("{}", name);
    }
}
