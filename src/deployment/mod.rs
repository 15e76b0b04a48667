//! Deployment collaborators
//!
//! The orchestrator depends on two capabilities it does not implement itself:
//! - resolving a deployment to the closure of cache units it needs
//! - executing the deployment into a cache directory
//!
//! Both are traits so tests can substitute fakes. The default
//! implementations run configured external programs.

mod executor;
mod resolver;

pub use executor::{CommandExecutor, DeploymentExecutor};
pub use resolver::{parse_closure, CommandResolver, DependencyResolver};

use std::process::ExitStatus;

/// Max number of stderr lines to include in error messages.
const ERROR_TAIL_LINES: usize = 20;

/// Extract the useful tail of a process's stderr for error diagnostics.
pub(crate) fn error_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Describe how a process ended
pub(crate) fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}
