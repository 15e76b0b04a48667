//! Search-path export for later CI steps
//!
//! GitHub Actions picks up one directory per line from the file named by
//! `GITHUB_PATH`. Outside CI the entries are printed instead.

use crate::error::{DeployError, DeployResult};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Where path entries go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathExport {
    /// Append to a GitHub Actions path file
    GithubPath(PathBuf),
    /// Print one entry per line on stdout
    Stdout,
}

impl PathExport {
    pub fn from_target(target: Option<PathBuf>) -> Self {
        match target {
            Some(path) => Self::GithubPath(path),
            None => Self::Stdout,
        }
    }

    /// Publish `entries` in order
    pub async fn apply(&self, entries: &[PathBuf]) -> DeployResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        match self {
            Self::GithubPath(file) => append_lines(file, entries).await,
            Self::Stdout => {
                for entry in entries {
                    println!("{}", entry.display());
                }
                Ok(())
            }
        }
    }
}

async fn append_lines(file: &Path, entries: &[PathBuf]) -> DeployResult<()> {
    let content: String = entries
        .iter()
        .map(|entry| format!("{}\n", entry.display()))
        .collect();

    let context = || format!("appending to {}", file.display());
    let mut handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .await
        .map_err(|e| DeployError::io(context(), e))?;

    handle
        .write_all(content.as_bytes())
        .await
        .map_err(|e| DeployError::io(context(), e))?;
    handle.flush().await.map_err(|e| DeployError::io(context(), e))?;
    Ok(())
}
