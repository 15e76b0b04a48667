//! Cache storage abstraction
//!
//! Provides a trait for key-addressed directory storage that can be
//! implemented by different backends (local directory store, remote CI
//! caches). The orchestrator only depends on this contract.

use crate::cache::key::CacheKey;
use crate::error::DeployResult;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Result of a restore attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Entry existed and `paths` now hold its content
    Hit,
    /// No entry for the key
    Miss,
}

impl RestoreOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
        }
    }
}

/// Abstract cache storage interface
///
/// A miss is not an error. Errors are reserved for transport or storage
/// failures and are reported as `DeployError::CacheBackend`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore the entry stored under `key` into `paths`
    async fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> DeployResult<RestoreOutcome>;

    /// Persist the content of `paths` under `key`
    async fn save(&self, paths: &[PathBuf], key: &CacheKey) -> DeployResult<()>;

    /// Get the human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
