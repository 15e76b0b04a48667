//! In-memory collaborators for orchestration tests

use crate::cache::{CacheKey, CacheName, CacheStore, RestoreOutcome, PATHS_FILE};
use crate::deployment::{DependencyResolver, DeploymentExecutor};
use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FakeResolver {
    result: Result<Vec<String>, String>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn with_closure(names: &[&str]) -> Self {
        Self {
            result: Ok(names.iter().map(|n| n.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependencyResolver for FakeResolver {
    async fn closure(&self, deployment: &str) -> DeployResult<Vec<CacheName>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(names) => names.iter().map(CacheName::new).collect(),
            Err(reason) => Err(DeployError::Resolution {
                deployment: deployment.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Writes files (relative to the cache dir) and optionally fails afterwards
#[derive(Default)]
pub struct FakeExecutor {
    files: Vec<(String, String)>,
    fail: bool,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeExecutor {
    pub fn writing(mut self, rel_path: &str, content: &str) -> Self {
        self.files.push((rel_path.to_string(), content.to_string()));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentExecutor for FakeExecutor {
    async fn execute(&self, deployment: &str, cache_dir: &Path) -> DeployResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((deployment.to_string(), cache_dir.to_path_buf()));

        for (rel, content) in &self.files {
            let path = cache_dir.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }

        if self.fail {
            return Err(DeployError::DeploymentExecution {
                deployment: deployment.to_string(),
                reason: "exited with code 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Restore { key: String, paths: Vec<PathBuf> },
    Save { key: String, paths: Vec<PathBuf> },
}

/// Cache store whose hits materialize as directories with an optional `paths.txt`
#[derive(Default)]
pub struct FakeStore {
    hits: HashMap<String, Option<String>>,
    broken_restores: HashSet<String>,
    failing_saves: HashSet<String>,
    calls: Mutex<Vec<StoreCall>>,
}

impl FakeStore {
    pub fn with_hit(mut self, key: &str) -> Self {
        self.hits.insert(key.to_string(), None);
        self
    }

    pub fn with_hit_paths(mut self, key: &str, paths_txt: &str) -> Self {
        self.hits.insert(key.to_string(), Some(paths_txt.to_string()));
        self
    }

    pub fn with_broken_restore(mut self, key: &str) -> Self {
        self.broken_restores.insert(key.to_string());
        self
    }

    pub fn with_failing_save(mut self, key: &str) -> Self {
        self.failing_saves.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn restored_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Restore { key, .. } => Some(key),
                StoreCall::Save { .. } => None,
            })
            .collect()
    }

    pub fn saves(&self) -> Vec<(String, Vec<PathBuf>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Save { key, paths } => Some((key, paths)),
                StoreCall::Restore { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl CacheStore for FakeStore {
    async fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> DeployResult<RestoreOutcome> {
        self.calls.lock().unwrap().push(StoreCall::Restore {
            key: key.to_string(),
            paths: paths.to_vec(),
        });

        if self.broken_restores.contains(key.as_str()) {
            return Err(DeployError::backend(key.as_str(), "connection reset"));
        }

        match self.hits.get(key.as_str()) {
            Some(paths_txt) => {
                for path in paths {
                    std::fs::create_dir_all(path).unwrap();
                    std::fs::write(path.join("restored"), key.as_str()).unwrap();
                    if let Some(content) = paths_txt {
                        std::fs::write(path.join(PATHS_FILE), content).unwrap();
                    }
                }
                Ok(RestoreOutcome::Hit)
            }
            None => Ok(RestoreOutcome::Miss),
        }
    }

    async fn save(&self, paths: &[PathBuf], key: &CacheKey) -> DeployResult<()> {
        self.calls.lock().unwrap().push(StoreCall::Save {
            key: key.to_string(),
            paths: paths.to_vec(),
        });

        if self.failing_saves.contains(key.as_str()) {
            return Err(DeployError::backend(key.as_str(), "quota exceeded"));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}
