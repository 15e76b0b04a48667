//! Cache addressing and storage
//!
//! Every cache-addressable unit of a deployment has a `CacheName`, which is
//! also its subdirectory under the cache directory. Its content is stored
//! under `name-{version}` so that bumping the version invalidates all caches
//! at once.
//!
//! # Unit States
//!
//! | State | Source | Persisted at end of run |
//! |-------|--------|-------------------------|
//! | Hit | Restored from the store | No (already durable) |
//! | Built | Written by the deployer | Yes |
//! | Built, marked | Written with `skip_cache_to_cicd` | No |

pub mod key;
pub mod local;
pub mod store;

pub use key::{dedup_closure, CacheKey, CacheName};
pub use local::{EntryManifest, LocalCacheStore};
pub use store::{CacheStore, RestoreOutcome};

/// Metadata file listing executable search path entries for a unit
pub const PATHS_FILE: &str = "paths.txt";

/// Marker file a deployer writes into units that must not be persisted
pub const SKIP_CACHE_MARKER: &str = "skip_cache_to_cicd";
