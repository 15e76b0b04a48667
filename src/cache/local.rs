//! Local directory cache store
//!
//! Stores each cache key as an immutable entry directory under a store root:
//!
//! ```text
//! {store_dir}/{key}/entry.json     manifest (key, paths, digest, sizes)
//! {store_dir}/{key}/data/{index}/  content of the index-th saved path
//! ```
//!
//! Entries are staged in a hidden `.staging-{uuid}` directory and renamed
//! into place, so a crashed save never leaves a half-written entry behind.
//! Restores verify the SHA256 content digest before copying anything out,
//! copy into a hidden `.restore-{uuid}` sibling and swap it in, so a
//! destination holds either the whole entry or nothing.

use crate::cache::key::CacheKey;
use crate::cache::store::{CacheStore, RestoreOutcome};
use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

const ENTRY_MANIFEST: &str = "entry.json";
const DATA_DIR: &str = "data";
const STAGING_PREFIX: &str = ".staging-";
const RESTORE_PREFIX: &str = ".restore-";

/// Metadata written next to every stored entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryManifest {
    /// Cache key the entry was saved under
    pub key: String,
    /// When the entry was saved
    pub created_at: DateTime<Utc>,
    /// Paths the entry was saved from, by index
    pub paths: Vec<String>,
    /// Number of regular files in the entry
    pub files: u64,
    /// Total size of regular files in bytes
    pub size_bytes: u64,
    /// SHA256 over the entry's tree (names, link targets, file contents)
    pub digest: String,
}

/// Cache store backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    /// Create a store rooted at `root` (created lazily on first save)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the store root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(entry_dir_name(key.as_str()))
    }

    /// List stored entries, newest first
    pub async fn list(&self) -> DeployResult<Vec<EntryManifest>> {
        let root = self.root.clone();
        blocking(move || list_entries(&root)).await
    }

    /// Remove every entry (and any leftover staging directory)
    pub async fn clear(&self) -> DeployResult<usize> {
        let root = self.root.clone();
        blocking(move || clear_entries(&root)).await
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> DeployResult<RestoreOutcome> {
        let entry = self.entry_dir(key);
        let paths = paths.to_vec();
        let key = key.as_str().to_string();
        blocking(move || restore_entry(&entry, &paths, &key)).await
    }

    async fn save(&self, paths: &[PathBuf], key: &CacheKey) -> DeployResult<()> {
        let root = self.root.clone();
        let entry = self.entry_dir(key);
        let paths = paths.to_vec();
        let key = key.as_str().to_string();
        blocking(move || save_entry(&root, &entry, &paths, &key)).await
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Run filesystem work off the async executor
async fn blocking<T, F>(f: F) -> DeployResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DeployResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DeployError::Internal(format!("cache task failed: {}", e)))?
}

/// Directory name for a key: the key itself when filesystem-safe, otherwise
/// a sanitized form with a short hash suffix so distinct keys never collide.
fn entry_dir_name(key: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');

    if !key.is_empty() && !key.starts_with('.') && key.chars().all(safe) {
        return key.to_string();
    }

    let sanitized: String = key
        .chars()
        .map(|c| if safe(c) { c } else { '_' })
        .collect();
    let hash = hex::encode(Sha256::digest(key.as_bytes()));
    format!("{}-{}", sanitized.trim_start_matches('.'), &hash[..12])
}

fn restore_entry(entry: &Path, paths: &[PathBuf], key: &str) -> DeployResult<RestoreOutcome> {
    let manifest_path = entry.join(ENTRY_MANIFEST);
    if !manifest_path.is_file() {
        debug!("No local cache entry for {}", key);
        return Ok(RestoreOutcome::Miss);
    }

    let manifest = read_manifest(&manifest_path)
        .map_err(|e| DeployError::backend(key, format!("reading manifest: {}", e)))?;

    if manifest.paths.len() != paths.len() {
        return Err(DeployError::backend(
            key,
            format!(
                "entry holds {} path(s) but {} were requested",
                manifest.paths.len(),
                paths.len()
            ),
        ));
    }

    let data = entry.join(DATA_DIR);
    let summary = digest_tree(&data)
        .map_err(|e| DeployError::backend(key, format!("hashing entry: {}", e)))?;
    if summary.digest != manifest.digest {
        return Err(DeployError::backend(
            key,
            "entry content does not match its recorded digest",
        ));
    }

    if let Err(e) = restore_paths(&data, paths) {
        for dst in paths {
            if let Err(cleanup) = remove_path(dst) {
                warn!("Failed to clean up {}: {}", dst.display(), cleanup);
            }
        }
        return Err(DeployError::backend(key, format!("restoring entry: {}", e)));
    }

    debug!(
        "Restored {} ({} files, {} bytes)",
        key, manifest.files, manifest.size_bytes
    );
    Ok(RestoreOutcome::Hit)
}

/// Copy every indexed data tree next to its destination, then swap it in.
///
/// Destinations end up holding exactly the entry's content, never a mix
/// with whatever was there before.
fn restore_paths(data: &Path, paths: &[PathBuf]) -> io::Result<()> {
    let mut staged = Vec::with_capacity(paths.len());

    let result = paths
        .iter()
        .enumerate()
        .try_for_each(|(index, dst)| {
            let staging = restore_staging_for(dst)?;
            staged.push(staging.clone());
            copy_tree(&data.join(index.to_string()), &staging)
        })
        .and_then(|()| {
            staged.iter().zip(paths).try_for_each(|(staging, dst)| {
                remove_path(dst)?;
                fs::rename(staging, dst)
            })
        });

    if result.is_err() {
        for staging in &staged {
            if let Err(e) = remove_path(staging) {
                warn!("Failed to clean up {}: {}", staging.display(), e);
            }
        }
    }
    result
}

/// Hidden sibling of `dst` to copy into before the swap
fn restore_staging_for(dst: &Path) -> io::Result<PathBuf> {
    let parent = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    Ok(parent.join(format!("{}{}", RESTORE_PREFIX, Uuid::new_v4())))
}

/// Remove a file, symlink or directory tree; absent paths are fine
fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether the entry's manifest is readable and matches its content
fn entry_is_intact(entry: &Path) -> bool {
    let Ok(manifest) = read_manifest(&entry.join(ENTRY_MANIFEST)) else {
        return false;
    };
    digest_tree(&entry.join(DATA_DIR))
        .map(|summary| summary.digest == manifest.digest)
        .unwrap_or(false)
}

fn save_entry(root: &Path, entry: &Path, paths: &[PathBuf], key: &str) -> DeployResult<()> {
    if entry.exists() {
        if entry_is_intact(entry) {
            info!("Cache entry {} already exists, keeping it", key);
            return Ok(());
        }
        warn!("Cache entry {} is damaged, replacing it", key);
        fs::remove_dir_all(entry)
            .map_err(|e| DeployError::backend(key, format!("removing damaged entry: {}", e)))?;
    }

    for path in paths {
        if fs::symlink_metadata(path).is_err() {
            return Err(DeployError::backend(
                key,
                format!("path does not exist: {}", path.display()),
            ));
        }
    }

    fs::create_dir_all(root)
        .map_err(|e| DeployError::backend(key, format!("creating store root: {}", e)))?;

    let staging = root.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
    let result = stage_entry(&staging, paths, key).and_then(|()| publish_entry(&staging, entry));

    if result.is_err() && staging.exists() {
        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!("Failed to clean up {}: {}", staging.display(), e);
        }
    }

    result.map_err(|e| DeployError::backend(key, e.to_string()))
}

fn stage_entry(staging: &Path, paths: &[PathBuf], key: &str) -> io::Result<()> {
    let data = staging.join(DATA_DIR);
    fs::create_dir_all(&data)?;

    for (index, path) in paths.iter().enumerate() {
        copy_tree(path, &data.join(index.to_string()))?;
    }

    let summary = digest_tree(&data)?;
    let manifest = EntryManifest {
        key: key.to_string(),
        created_at: Utc::now(),
        paths: paths.iter().map(|p| p.display().to_string()).collect(),
        files: summary.files,
        size_bytes: summary.size_bytes,
        digest: summary.digest,
    };

    let json = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
    fs::write(staging.join(ENTRY_MANIFEST), json)
}

fn publish_entry(staging: &Path, entry: &Path) -> io::Result<()> {
    // A directory without a manifest is debris from an interrupted clear
    if entry.exists() && !entry.join(ENTRY_MANIFEST).is_file() {
        fs::remove_dir_all(entry)?;
    }

    match fs::rename(staging, entry) {
        Ok(()) => Ok(()),
        Err(_) if entry.join(ENTRY_MANIFEST).is_file() => {
            debug!("Entry {} was published concurrently", entry.display());
            fs::remove_dir_all(staging)
        }
        Err(e) => Err(e),
    }
}

fn read_manifest(path: &Path) -> io::Result<EntryManifest> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn list_entries(root: &Path) -> DeployResult<Vec<EntryManifest>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let read_err = |e: io::Error| DeployError::io(format!("reading cache store {}", root.display()), e);
    let mut manifests = Vec::new();

    for entry in fs::read_dir(root).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry_is_hidden(&entry.path()) {
            continue;
        }

        let manifest_path = entry.path().join(ENTRY_MANIFEST);
        if !manifest_path.is_file() {
            continue;
        }

        match read_manifest(&manifest_path) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => warn!("Skipping unreadable entry {}: {}", manifest_path.display(), e),
        }
    }

    manifests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(manifests)
}

fn clear_entries(root: &Path) -> DeployResult<usize> {
    if !root.is_dir() {
        return Ok(0);
    }

    let read_err = |e: io::Error| DeployError::io(format!("reading cache store {}", root.display()), e);
    let mut removed = 0;

    for entry in fs::read_dir(root).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_dir() {
            continue;
        }
        fs::remove_dir_all(&path)
            .map_err(|e| DeployError::io(format!("removing {}", path.display()), e))?;
        if !entry_is_hidden(&path) {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Staging directories are hidden and never count as entries
fn entry_is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

struct TreeSummary {
    digest: String,
    files: u64,
    size_bytes: u64,
}

/// Hash a tree in a stable (sorted) order
fn digest_tree(root: &Path) -> io::Result<TreeSummary> {
    let mut hasher = Sha256::new();
    let mut files = 0;
    let mut size_bytes = 0;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let rel = relative_name(root, entry.path());
        let file_type = entry.file_type();

        if file_type.is_dir() {
            hasher.update(b"d\0");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            hasher.update(b"l\0");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            hasher.update(target.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        } else if file_type.is_file() {
            let len = entry.metadata().map_err(io::Error::from)?.len();
            hasher.update(b"f\0");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            hasher.update(len.to_le_bytes());
            io::copy(&mut fs::File::open(entry.path())?, &mut hasher)?;
            files += 1;
            size_bytes += len;
        }
    }

    Ok(TreeSummary {
        digest: hex::encode(hasher.finalize()),
        files,
        size_bytes,
    })
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Copy a file or directory tree, recreating symlinks instead of following them
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if !meta.is_dir() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        return copy_entry(src, dst, meta.file_type());
    }

    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copy_entry(entry.path(), &target, entry.file_type())?;
        }
    }

    Ok(())
}

fn copy_entry(src: &Path, dst: &Path, file_type: fs::FileType) -> io::Result<()> {
    if file_type.is_symlink() {
        copy_symlink(src, dst)
    } else if file_type.is_file() {
        fs::copy(src, dst).map(|_| ())
    } else {
        // Sockets, fifos and devices are not cacheable
        Ok(())
    }
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> io::Result<()> {
    debug!("Skipping symlink {}", src.display());
    Ok(())
}
