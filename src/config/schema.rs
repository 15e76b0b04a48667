//! Configuration schema for deploycache
//!
//! Configuration is stored at `~/.config/deploycache/config.toml`, with an
//! optional project-local `.deploycache.toml` merged on top.

use crate::config::ConfigManager;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Command that prints a deployment's cache-name closure as JSON
    pub resolver: CommandSpec,

    /// Command that performs a deployment into a cache directory
    pub executor: CommandSpec,

    /// Cache settings
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            resolver: CommandSpec::new(
                "python3",
                [
                    ".github/scripts/get-deployment.py",
                    "get-deployment-all-cache-names",
                    "{deployment}",
                ],
            ),
            executor: CommandSpec::new(
                "python3",
                [
                    ".github/scripts/get-deployment.py",
                    "deploy",
                    "{deployment}",
                    "--cache-dir",
                    "{cache_dir}",
                ],
            ),
            cache: CacheConfig::default(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append a JSON line per run to the journal file
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: false,
        }
    }
}

/// External program invocation with `{placeholder}` arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to run (looked up on PATH)
    pub program: String,

    /// Arguments; `{deployment}` and `{cache_dir}` are substituted
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Substitute `{name}` placeholders in every argument.
    ///
    /// Each argument is scanned once, so substituted values are never
    /// expanded again. Unknown placeholders are kept as written.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args.iter().map(|arg| render_arg(arg, vars)).collect()
    }

    /// Command line for logs and error messages
    pub fn display_with(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory deployers write one subdirectory per cache unit into
    pub dir: PathBuf,

    /// Root of the local cache store (defaults to the user cache dir)
    pub store_dir: Option<PathBuf>,

    /// Maximum concurrent restores/saves
    pub parallelism: usize,
}

impl CacheConfig {
    /// Resolved store directory
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_store_dir)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("deployment_caches"),
            store_dir: None,
            parallelism: 4,
        }
    }
}

fn render_arg(arg: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
