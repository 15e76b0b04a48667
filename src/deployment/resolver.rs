//! Dependency closure resolution
//!
//! Resolves a deployment name to the ordered set of cache units it needs,
//! including transitive sub-deployments. The closure is used verbatim: the
//! deployment's own name is only part of it if the resolver says so.

use crate::cache::{dedup_closure, CacheName};
use crate::config::CommandSpec;
use crate::deployment::{describe_status, error_tail};
use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Resolves deployments to their cache-unit closure
///
/// Implementations must behave as a pure function of the deployment name
/// and must fail with `DeployError::Resolution` rather than return a
/// partial closure.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn closure(&self, deployment: &str) -> DeployResult<Vec<CacheName>>;
}

/// Resolver that runs an external program printing a JSON array of names
pub struct CommandResolver {
    command: CommandSpec,
}

impl CommandResolver {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl DependencyResolver for CommandResolver {
    async fn closure(&self, deployment: &str) -> DeployResult<Vec<CacheName>> {
        let args = self.command.render(&[("deployment", deployment)]);
        let command_line = self.command.display_with(&args);
        debug!("Resolving closure: {}", command_line);

        let output = Command::new(&self.command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| resolution(deployment, format!("could not run {}: {}", command_line, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(resolution(
                deployment,
                format!(
                    "{} {}\n{}",
                    command_line,
                    describe_status(output.status),
                    error_tail(&stderr)
                ),
            ));
        }

        let closure = parse_closure(deployment, &String::from_utf8_lossy(&output.stdout))?;
        debug!("Closure of {}: {} unit(s)", deployment, closure.len());
        Ok(closure)
    }
}

/// Parse resolver output into a validated, duplicate-free closure.
///
/// The whole output is tried first; if that is not JSON, the last non-empty
/// line is tried, so resolvers may print diagnostics before the result.
pub fn parse_closure(deployment: &str, stdout: &str) -> DeployResult<Vec<CacheName>> {
    let trimmed = stdout.trim();

    let names: Vec<String> = serde_json::from_str(trimmed)
        .or_else(|first_err| {
            trimmed
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .and_then(|line| serde_json::from_str(line.trim()).ok())
                .ok_or(first_err)
        })
        .map_err(|e| {
            resolution(
                deployment,
                format!("resolver output is not a JSON array of names: {}", e),
            )
        })?;

    let names = names
        .into_iter()
        .map(|name| CacheName::new(name).map_err(|e| resolution(deployment, e.to_string())))
        .collect::<DeployResult<Vec<_>>>()?;

    Ok(dedup_closure(names))
}

fn resolution(deployment: &str, reason: impl Into<String>) -> DeployError {
    DeployError::Resolution {
        deployment: deployment.to_string(),
        reason: reason.into(),
    }
}
