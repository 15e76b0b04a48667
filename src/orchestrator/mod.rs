//! Deployment cache orchestration
//!
//! Runs one deployment through a fixed sequence of stages:
//!
//! ```text
//! Resolving -> Restoring -> Executing -> Persisting -> PropagatingPaths -> Done
//!     |                        |
//!     +--------> Failed <------+
//! ```
//!
//! Only resolution and execution can fail a run. Cache and path problems
//! are isolated per unit, logged, and returned as `StageWarning`s.

#[cfg(test)]
pub(crate) mod fakes;
mod paths;
mod persist;
mod restore;

pub use paths::{collect_path_entries, parse_path_records};
pub use persist::{persist_units, PersistSummary};
pub use restore::{restore_closure, HitMap};

use crate::cache::{CacheKey, CacheName, CacheStore};
use crate::deployment::{DependencyResolver, DeploymentExecutor};
use crate::error::{DeployError, DeployResult};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of concurrent restores/saves
pub const DEFAULT_PARALLELISM: usize = 4;

/// Orchestration stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Restoring,
    Executing,
    Persisting,
    PropagatingPaths,
    Done,
    Failed,
}

impl Stage {
    /// Whether a failure in this stage aborts the run
    pub fn is_fatal_on_error(&self) -> bool {
        matches!(self, Self::Resolving | Self::Executing)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Restoring => "restoring",
            Self::Executing => "executing",
            Self::Persisting => "persisting",
            Self::PropagatingPaths => "propagating-paths",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Non-fatal problem recorded during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageWarning {
    /// Restore failed in the backend; the unit was treated as a miss
    CacheBackend {
        name: CacheName,
        key: CacheKey,
        reason: String,
    },
    /// Save failed; the unit will be rebuilt by a future run
    CachePersist {
        name: CacheName,
        key: CacheKey,
        reason: String,
    },
    /// `paths.txt` exists but could not be read
    PathPropagation {
        name: CacheName,
        path: PathBuf,
        reason: String,
    },
    /// The cache directory could not be listed after execution
    UnitListing { path: PathBuf, reason: String },
}

impl fmt::Display for StageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheBackend { name, key, reason } => {
                write!(f, "restore of {} ({}) failed, treating as miss: {}", name, key, reason)
            }
            Self::CachePersist { name, key, reason } => {
                write!(f, "saving {} ({}) failed: {}", name, key, reason)
            }
            Self::PathPropagation { name, path, reason } => {
                write!(f, "reading {} for {} failed: {}", path.display(), name, reason)
            }
            Self::UnitListing { path, reason } => {
                write!(f, "listing {} failed: {}", path.display(), reason)
            }
        }
    }
}

/// Inputs of one orchestration run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Deployment to realize
    pub deployment: String,
    /// Appended to every cache key; bump it to invalidate all caches
    pub version_suffix: String,
    /// Directory holding one subdirectory per cache unit
    pub cache_dir: PathBuf,
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub deployment: String,
    /// Resolved closure, in resolver order
    pub closure: Vec<CacheName>,
    pub hits: HitMap,
    /// Unit directories present after execution, in listing order
    pub units: Vec<CacheName>,
    /// Keys saved in this run
    pub saved: Vec<CacheKey>,
    /// Units not saved because the deployer marked them
    pub skipped_marked: Vec<CacheName>,
    /// Search-path entries for later steps; the caller applies them
    pub path_entries: Vec<PathBuf>,
    pub warnings: Vec<StageWarning>,
}

/// Sequences resolve, restore, execute, persist and path propagation
pub struct Orchestrator {
    resolver: Arc<dyn DependencyResolver>,
    executor: Arc<dyn DeploymentExecutor>,
    store: Arc<dyn CacheStore>,
    parallelism: usize,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<dyn DependencyResolver>,
        executor: Arc<dyn DeploymentExecutor>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            resolver,
            executor,
            store,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Bound concurrent restores/saves (at least 1)
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run one deployment through all stages
    pub async fn run(&self, request: &RunRequest) -> DeployResult<RunReport> {
        let deployment = request.deployment.as_str();
        let cache_dir = request.cache_dir.as_path();
        let mut tracker = StageTracker::new(deployment);

        let closure = match self.resolver.closure(deployment).await {
            Ok(closure) => closure,
            Err(e) => return Err(tracker.fail(as_resolution(deployment, e))),
        };
        info!("Deployment {} needs {} cache unit(s)", deployment, closure.len());

        tracker.advance(Stage::Restoring);
        let (hits, mut warnings) = restore_closure(
            self.store.as_ref(),
            &closure,
            cache_dir,
            &request.version_suffix,
            self.parallelism,
        )
        .await;
        info!("Restored {}/{} cache unit(s)", hits.hit_count(), closure.len());

        tracker.advance(Stage::Executing);
        if let Err(e) = self.executor.execute(deployment, cache_dir).await {
            return Err(tracker.fail(as_execution(deployment, e)));
        }

        tracker.advance(Stage::Persisting);
        let units = match list_units(cache_dir).await {
            Ok(units) => units,
            Err(warning) => {
                warn!("{}", warning);
                warnings.push(warning);
                Vec::new()
            }
        };
        let persisted = persist_units(
            self.store.as_ref(),
            cache_dir,
            &units,
            &hits,
            &request.version_suffix,
            self.parallelism,
        )
        .await;
        warnings.extend(persisted.warnings);

        tracker.advance(Stage::PropagatingPaths);
        let (path_entries, path_warnings) = collect_path_entries(cache_dir, &units).await;
        warnings.extend(path_warnings);

        tracker.advance(Stage::Done);
        Ok(RunReport {
            deployment: deployment.to_string(),
            closure,
            hits,
            units,
            saved: persisted.saved,
            skipped_marked: persisted.skipped_marked,
            path_entries,
            warnings,
        })
    }
}

/// Logs stage transitions and guards the failure edges
struct StageTracker<'a> {
    deployment: &'a str,
    current: Stage,
}

impl<'a> StageTracker<'a> {
    fn new(deployment: &'a str) -> Self {
        debug!("{}: entering {}", deployment, Stage::Resolving);
        Self {
            deployment,
            current: Stage::Resolving,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!("{}: {} -> {}", self.deployment, self.current, next);
        self.current = next;
    }

    fn fail(&mut self, error: DeployError) -> DeployError {
        debug_assert!(self.current.is_fatal_on_error());
        debug!("{}: {} -> {}", self.deployment, self.current, Stage::Failed);
        self.current = Stage::Failed;
        error
    }
}

fn as_resolution(deployment: &str, error: DeployError) -> DeployError {
    match error {
        DeployError::Resolution { .. } => error,
        other => DeployError::Resolution {
            deployment: deployment.to_string(),
            reason: other.to_string(),
        },
    }
}

fn as_execution(deployment: &str, error: DeployError) -> DeployError {
    match error {
        DeployError::DeploymentExecution { .. } => error,
        other => DeployError::DeploymentExecution {
            deployment: deployment.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Store failure text without the error's own key prefix
pub(crate) fn backend_reason(error: DeployError) -> String {
    match error {
        DeployError::CacheBackend { reason, .. } => reason,
        other => other.to_string(),
    }
}

/// Immediate subdirectories of `cache_dir` that are valid unit names, sorted.
///
/// An absent directory means the deployer produced nothing cache-worthy.
pub async fn list_units(cache_dir: &Path) -> Result<Vec<CacheName>, StageWarning> {
    let listing_failed = |e: std::io::Error| StageWarning::UnitListing {
        path: cache_dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut entries = match tokio::fs::read_dir(cache_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} does not exist, nothing to persist", cache_dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(listing_failed(e)),
    };

    let mut units = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_failed)? {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_dir {
            debug!("Ignoring non-directory {}", entry.path().display());
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Ignoring unit directory with non UTF-8 name {:?}", raw);
                continue;
            }
        };

        match CacheName::new(name) {
            Ok(name) => units.push(name),
            Err(e) => warn!("Ignoring unit directory: {}", e),
        }
    }

    units.sort();
    Ok(units)
}
