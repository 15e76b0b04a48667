//! Restore stage: pull every closure unit from the cache store

use crate::cache::{CacheName, CacheStore};
use crate::orchestrator::{backend_reason, StageWarning};
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Which closure units were restored from the cache in this run
///
/// Built once by the restore stage and only read afterwards. Units that
/// are not in the map (e.g. produced by the deployer outside the closure)
/// count as misses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitMap(HashMap<CacheName, bool>);

impl HitMap {
    /// Whether `name` was restored from the cache
    pub fn is_hit(&self, name: &CacheName) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Recorded outcome for `name`, if it was part of the closure
    pub fn get(&self, name: &CacheName) -> Option<bool> {
        self.0.get(name).copied()
    }

    /// Number of units restored
    pub fn hit_count(&self) -> usize {
        self.0.values().filter(|hit| **hit).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(CacheName, bool)> for HitMap {
    fn from_iter<I: IntoIterator<Item = (CacheName, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Restore each unit into `cache_dir/name`.
///
/// Restores run with at most `parallelism` in flight. A backend failure is
/// recorded as a miss plus a warning; the deployer will rebuild the unit.
pub async fn restore_closure(
    store: &dyn CacheStore,
    closure: &[CacheName],
    cache_dir: &Path,
    version_suffix: &str,
    parallelism: usize,
) -> (HitMap, Vec<StageWarning>) {
    let results: Vec<_> = stream::iter(closure)
        .map(|name| async move {
            let key = name.key(version_suffix);
            let outcome = store.restore(&[name.dir_in(cache_dir)], &key).await;
            (name, key, outcome)
        })
        .buffered(parallelism.max(1))
        .collect()
        .await;

    let mut warnings = Vec::new();
    let mut hits = Vec::with_capacity(results.len());

    for (name, key, outcome) in results {
        let hit = match outcome {
            Ok(outcome) => {
                info!("Cache {} for {} ({})", outcome, name, key);
                outcome.is_hit()
            }
            Err(e) => {
                let warning = StageWarning::CacheBackend {
                    name: name.clone(),
                    key,
                    reason: backend_reason(e),
                };
                warn!("{}", warning);
                warnings.push(warning);
                false
            }
        };
        hits.push((name.clone(), hit));
    }

    (hits.into_iter().collect(), warnings)
}
