//! `RangeCacheManager` — top-level handle
//!
//! Combines the per-path storage (`persisted`), the lifecycle clock (`entries`),
//! counters (`stats`), and the two background task submitters into one cloneable
//! handle. `RangeCacheManager` is a thin `Arc<Inner>` wrapper (the shape the teacher's
//! own `AsyncCache`-style handles use) so that cloning it into a spawned flush or
//! deletion task is just an `Arc::clone`.

use std::{ops::Deref, path::PathBuf, sync::Arc};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::{
    config::CacheConfig,
    entry_cache::EntryCache,
    error::{CacheError, CacheResult},
    executor::TaskExecutor,
    path::RemotePath,
    range::CacheRange,
    stats::{CacheStatsSnapshot, Stats},
};

/// Shared state reachable both from `RangeCacheManager`'s own methods and from tasks
/// spawned on the write/delete executors.
pub(crate) struct Inner {
    pub(crate) config: CacheConfig,
    pub(crate) persisted: DashMap<RemotePath, Arc<CacheRange>>,
    pub(crate) entries: EntryCache,
    pub(crate) stats: Stats,
    pub(crate) write_exec: TaskExecutor,
    pub(crate) delete_exec: TaskExecutor,
}

impl Inner {
    /// Refresh `path`'s access clock, tearing down any path it displaces via capacity or
    /// TTL eviction (§4.2, §4.6).
    pub(crate) fn touch(&self, path: RemotePath) {
        self.entries.touch(&path, |evicted| self.evict_path(evicted));
    }

    /// Remove `path` from `persisted` and dispatch deletion of its files to the
    /// delete-executor (§4.6). A no-op if `path` has no live range.
    pub(crate) fn evict_path(&self, path: RemotePath) {
        let Some((_, range)) = self.persisted.remove(&path) else {
            return;
        };

        self.delete_exec.submit(async move {
            let files = range.snapshot();
            for entry in files {
                delete_best_effort(&entry.file.local_path).await;
            }
        });
    }
}

/// Best-effort file deletion used by both eviction and the merge protocol's cleanup
/// phase. I/O errors (including "already gone") are swallowed and logged at `debug!`.
pub(crate) async fn delete_best_effort(path: &std::path::Path) {
    let path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || std::fs::remove_file(&path)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "best-effort delete failed"),
        Err(err) => debug!(error = %err, "best-effort delete task panicked"),
    }
}

/// Top-level handle for the local range cache. Cheaply `Clone`-able; every clone shares
/// the same storage, lifecycle clock, counters, and executors.
#[derive(Clone)]
pub struct RangeCacheManager(pub(crate) Arc<Inner>);

impl Deref for RangeCacheManager {
    type Target = Inner;

    fn deref(&self) -> &Inner {
        &self.0
    }
}

impl RangeCacheManager {
    /// Validate `config`, create `base_directory` if absent, and spawn a best-effort
    /// purge of any regular files already present in it (the cache does not persist
    /// metadata across restarts, so leftover files are orphans from a prior run).
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.base_directory).map_err(|err| {
            CacheError::Configuration(format!(
                "failed to create base_directory {:?}: {err}",
                config.base_directory
            ))
        })?;

        let handle = Handle::current();
        let inner = Arc::new(Inner {
            entries: EntryCache::new(config.max_cached_entries, config.cache_ttl),
            persisted: DashMap::new(),
            stats: Stats::new(),
            write_exec: TaskExecutor::new(handle.clone()),
            delete_exec: TaskExecutor::new(handle),
            config,
        });

        purge_stray_files(&inner);

        Ok(Self(inner))
    }

    /// Point-in-time read of hit/miss/in-flight-byte counters
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.0.stats.snapshot()
    }

    /// Remove `path`'s cached range immediately, forwarding to the same teardown path
    /// as TTL/capacity eviction
    pub fn invalidate(&self, path: &RemotePath) {
        self.0.entries.remove(path);
        self.0.evict_path(path.clone());
    }

    /// The directory this manager's cache files live under
    pub fn base_directory(&self) -> &PathBuf {
        &self.0.config.base_directory
    }

    /// Forcibly terminate both executors. In-flight flush/delete tasks are abandoned,
    /// not awaited; any files they were writing become orphans purged on next startup.
    pub fn shutdown(&self) {
        self.0.write_exec.shutdown();
        self.0.delete_exec.shutdown();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.write_exec.outstanding_len() > 0 || self.delete_exec.outstanding_len() > 0 {
            debug!("range cache manager dropped without explicit shutdown");
        }
        self.write_exec.shutdown();
        self.delete_exec.shutdown();
    }
}

fn purge_stray_files(inner: &Arc<Inner>) {
    let base_directory = inner.config.base_directory.clone();
    inner.delete_exec.submit(async move {
        let entries = match tokio::task::spawn_blocking(move || std::fs::read_dir(&base_directory)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(err)) => {
                warn!(error = %err, "failed to list base_directory for startup purge");
                return;
            }
            Err(err) => {
                warn!(error = %err, "startup purge listing task panicked");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if matches!(entry.file_type(), Ok(file_type) if file_type.is_file()) {
                delete_best_effort(&path).await;
            }
        }
    });
}
