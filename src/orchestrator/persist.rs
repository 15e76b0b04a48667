//! Persist stage: save freshly built units back to the cache store

use crate::cache::{CacheKey, CacheName, CacheStore, SKIP_CACHE_MARKER};
use crate::orchestrator::{backend_reason, HitMap, StageWarning};
use futures_util::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, warn};

/// What the persist stage did with each unit
#[derive(Debug, Default)]
pub struct PersistSummary {
    /// Keys saved in this run
    pub saved: Vec<CacheKey>,
    /// Units restored from the cache, not saved again
    pub skipped_hits: Vec<CacheName>,
    /// Units the deployer marked as not cacheable
    pub skipped_marked: Vec<CacheName>,
    /// Failed saves
    pub warnings: Vec<StageWarning>,
}

/// Save every unit in `units` that is neither a hit nor marked skip-cache.
///
/// Each unit is saved at most once. A failed save only costs a rebuild in a
/// future run, so it is reported as a warning.
pub async fn persist_units(
    store: &dyn CacheStore,
    cache_dir: &Path,
    units: &[CacheName],
    hits: &HitMap,
    version_suffix: &str,
    parallelism: usize,
) -> PersistSummary {
    let mut summary = PersistSummary::default();
    let mut to_save = Vec::new();

    for name in units {
        if hits.is_hit(name) {
            info!("Skipping save for {}: restored from cache", name);
            summary.skipped_hits.push(name.clone());
            continue;
        }

        let marker = name.dir_in(cache_dir).join(SKIP_CACHE_MARKER);
        if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
            info!("Skipping save for {}: marked {}", name, SKIP_CACHE_MARKER);
            summary.skipped_marked.push(name.clone());
            continue;
        }

        to_save.push(name);
    }

    debug!("Saving {} of {} unit(s)", to_save.len(), units.len());

    let results: Vec<_> = stream::iter(to_save)
        .map(|name| async move {
            let key = name.key(version_suffix);
            let result = store.save(&[name.dir_in(cache_dir)], &key).await;
            (name, key, result)
        })
        .buffered(parallelism.max(1))
        .collect()
        .await;

    for (name, key, result) in results {
        match result {
            Ok(()) => {
                info!("Saved cache for {} ({})", name, key);
                summary.saved.push(key);
            }
            Err(e) => {
                let warning = StageWarning::CachePersist {
                    name: name.clone(),
                    key,
                    reason: backend_reason(e),
                };
                warn!("{}", warning);
                summary.warnings.push(warning);
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::fakes::FakeStore;
    use std::fs;
    use tempfile::TempDir;

    fn unit(cache_dir: &Path, name: &str) -> CacheName {
        fs::create_dir_all(cache_dir.join(name)).unwrap();
        CacheName::new(name).unwrap()
    }

    #[tokio::test]
    async fn saves_misses_and_skips_hits() {
        let temp = TempDir::new().unwrap();
        let base = unit(temp.path(), "base");
        let compiler = unit(temp.path(), "compiler");
        let hits: HitMap = vec![(base.clone(), true), (compiler.clone(), false)]
            .into_iter()
            .collect();
        let store = FakeStore::default();

        let summary = persist_units(
            &store,
            temp.path(),
            &[base.clone(), compiler.clone()],
            &hits,
            "v1",
            4,
        )
        .await;

        assert_eq!(summary.skipped_hits, vec![base]);
        assert_eq!(
            store.saves(),
            vec![("compiler-v1".to_string(), vec![temp.path().join("compiler")])]
        );
    }

    #[tokio::test]
    async fn marked_unit_is_not_saved() {
        let temp = TempDir::new().unwrap();
        let tools = unit(temp.path(), "tools");
        fs::write(temp.path().join("tools").join(SKIP_CACHE_MARKER), "").unwrap();
        let store = FakeStore::default();

        let summary =
            persist_units(&store, temp.path(), &[tools.clone()], &HitMap::default(), "v1", 1)
                .await;

        assert_eq!(summary.skipped_marked, vec![tools]);
        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn failed_save_is_a_warning() {
        let temp = TempDir::new().unwrap();
        let a = unit(temp.path(), "a");
        let b = unit(temp.path(), "b");
        let store = FakeStore::default().with_failing_save("a-v1");

        let summary =
            persist_units(&store, temp.path(), &[a, b], &HitMap::default(), "v1", 2).await;

        assert_eq!(summary.saved.len(), 1);
        assert_eq!(summary.saved[0].as_str(), "b-v1");
        assert_eq!(summary.warnings.len(), 1);
        match &summary.warnings[0] {
            StageWarning::CachePersist { reason, .. } => assert_eq!(reason, "quota exceeded"),
            other => panic!("unexpected warning: {:?}", other),
        }
        assert!(!summary.warnings[0].to_string().contains("Cache backend error"));
    }
}
