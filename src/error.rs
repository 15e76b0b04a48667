//! Error types for deploycache
//!
//! All modules use `DeployResult<T>` as their return type.

use crate::orchestrator::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for deploycache operations
pub type DeployResult<T> = Result<T, DeployError>;

/// All errors that can occur in deploycache
#[derive(Error, Debug)]
pub enum DeployError {
    // Orchestration errors
    #[error("Resolving deployment '{deployment}' failed: {reason}")]
    Resolution { deployment: String, reason: String },

    #[error("Executing deployment '{deployment}' failed: {reason}")]
    DeploymentExecution { deployment: String, reason: String },

    #[error("Invalid cache name '{name}': {reason}")]
    InvalidCacheName { name: String, reason: String },

    // Cache errors
    #[error("Cache backend error for key {key}: {reason}")]
    CacheBackend { key: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache backend error for a key
    pub fn backend(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheBackend {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// The orchestration stage this error aborted, if it is a fatal run error
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Resolution { .. } => Some(Stage::Resolving),
            Self::DeploymentExecution { .. } => Some(Stage::Executing),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Resolution { .. } => {
                Some("Check the deployment name and the [resolver] command in your config")
            }
            Self::DeploymentExecution { .. } => {
                Some("See the deployer output above; no caches were saved for this run")
            }
            Self::ConfigInvalid { .. } => Some("Run: deploycache config show"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_stage_and_deployment() {
        let err = DeployError::Resolution {
            deployment: "python_build".to_string(),
            reason: "exit code 2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Resolving"));
        assert!(msg.contains("python_build"));
    }

    #[test]
    fn error_stage() {
        let err = DeployError::DeploymentExecution {
            deployment: "x".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.stage(), Some(Stage::Executing));
        assert_eq!(DeployError::backend("k", "r").stage(), None);
    }

    #[test]
    fn error_hint() {
        let err = DeployError::Resolution {
            deployment: "x".to_string(),
            reason: "r".to_string(),
        };
        assert!(err.hint().is_some());
        assert_eq!(DeployError::Internal("x".to_string()).hint(), None);
    }
}
