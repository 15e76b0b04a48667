//! Deployment execution
//!
//! Runs the actual environment construction. The executor decides on its
//! own what to (re)build based on which unit directories already exist in
//! the cache directory; it is never told which units were cache hits.

use crate::config::CommandSpec;
use crate::deployment::describe_status;
use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Performs a deployment into a cache directory
#[async_trait]
pub trait DeploymentExecutor: Send + Sync {
    /// Build `deployment`, writing one subdirectory per built unit into `cache_dir`
    async fn execute(&self, deployment: &str, cache_dir: &Path) -> DeployResult<()>;
}

/// Executor that runs an external deployer with inherited standard streams
pub struct CommandExecutor {
    command: CommandSpec,
}

impl CommandExecutor {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl DeploymentExecutor for CommandExecutor {
    async fn execute(&self, deployment: &str, cache_dir: &Path) -> DeployResult<()> {
        let cache_dir = cache_dir.display().to_string();
        let args = self
            .command
            .render(&[("deployment", deployment), ("cache_dir", cache_dir.as_str())]);
        let command_line = self.command.display_with(&args);
        info!("Running deployer: {}", command_line);

        let status = Command::new(&self.command.program)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DeployError::DeploymentExecution {
                deployment: deployment.to_string(),
                reason: format!("could not run {}: {}", command_line, e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DeployError::DeploymentExecution {
                deployment: deployment.to_string(),
                reason: format!("{} {}", command_line, describe_status(status)),
            })
        }
    }
}
