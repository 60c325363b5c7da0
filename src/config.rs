//! Cache configuration
//!
//! Mirrors the builder-plus-`validate()` shape used throughout the corpus for cache
//! configuration structs (e.g. `DiskCacheConfig`, `MemoryCacheConfig`): sensible
//! defaults, chainable `with_*` setters, and a `validate()` that rejects nonsensical
//! values before they reach [`crate::RangeCacheManager::new`].

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::CacheError;

/// Configuration for a [`crate::RangeCacheManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Filesystem directory where `.cache` files are written. Created on startup if it
    /// does not exist; any regular files already present are purged (see
    /// `RangeCacheManager::new`) since the cache does not persist its index across
    /// restarts.
    pub base_directory: PathBuf,

    /// Maximum number of distinct remote paths tracked at once. Once this many paths
    /// have live entries, inserting a new one evicts the least-recently-touched path
    /// (and all of its on-disk cache files).
    pub max_cached_entries: usize,

    /// A path's cached ranges are evicted once this much time has passed since the last
    /// `get` or `put` touched it.
    pub cache_ttl: Duration,

    /// Soft ceiling, in bytes, on the sum of `data.len()` over all `put()` calls that
    /// have been admitted but whose flush has not yet completed. `put()` rejects new
    /// writes once this watermark would be exceeded.
    ///
    /// The admission check reads this watermark and then increments it as two separate
    /// steps (not a single compare-and-swap), so two concurrent `put()` calls can each
    /// observe headroom and together overshoot by up to one `data.len()`. This is
    /// intentional: it is a soft backpressure knob, not a hard memory safety bound, and
    /// a CAS reservation would cost a second atomic round-trip on every `put()`.
    pub max_in_memory_cache_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("range-cache"),
            max_cached_entries: 10_000,
            cache_ttl: Duration::from_secs(3600),
            max_in_memory_cache_size: 64 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    /// Start from [`CacheConfig::default`] rooted at the given directory
    pub fn new<P: Into<PathBuf>>(base_directory: P) -> Self {
        Self {
            base_directory: base_directory.into(),
            ..Self::default()
        }
    }

    /// Set the base directory
    pub fn with_base_directory<P: Into<PathBuf>>(mut self, base_directory: P) -> Self {
        self.base_directory = base_directory.into();
        self
    }

    /// Set the entry-cache capacity
    pub fn with_max_cached_entries(mut self, max_cached_entries: usize) -> Self {
        self.max_cached_entries = max_cached_entries;
        self
    }

    /// Set the access-idle TTL
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Set the in-flight byte watermark
    pub fn with_max_in_memory_cache_size(mut self, max_in_memory_cache_size: u64) -> Self {
        self.max_in_memory_cache_size = max_in_memory_cache_size;
        self
    }

    /// Validate the configuration, returning a [`CacheError::Configuration`] describing
    /// the first problem found
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_cached_entries == 0 {
            return Err(CacheError::Configuration(
                "max_cached_entries must be greater than 0".to_string(),
            ));
        }

        if self.cache_ttl.is_zero() {
            return Err(CacheError::Configuration(
                "cache_ttl must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
