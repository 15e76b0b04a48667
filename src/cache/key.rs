//! Cache unit names and the keys derived from them
//!
//! A `CacheName` identifies one cache-addressable unit and doubles as the
//! name of its subdirectory under the cache directory, so it must be a
//! single safe path component. Keys are `name-suffix`, where the suffix is
//! the caller-supplied cache version.

use crate::error::{DeployError, DeployResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of one cache-addressable unit (a sub-deployment)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheName(String);

impl CacheName {
    /// Validate and wrap a unit name
    pub fn new(name: impl Into<String>) -> DeployResult<Self> {
        let name = name.into();
        validate_cache_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the cache key for this unit under a version suffix
    pub fn key(&self, version_suffix: &str) -> CacheKey {
        CacheKey(format!("{}-{}", self.0, version_suffix))
    }

    /// Directory this unit occupies inside `cache_dir`
    pub fn dir_in(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(&self.0)
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key a unit is stored under for one run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate that a unit name is a single path component.
fn validate_cache_name(name: &str) -> DeployResult<()> {
    let invalid = |reason: &str| DeployError::InvalidCacheName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("must not be '.' or '..'"));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(invalid("must not contain path separators or NUL"));
    }
    Ok(())
}

/// Ordered, duplicate-free list of unit names a deployment needs
pub fn dedup_closure(names: Vec<CacheName>) -> Vec<CacheName> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
