//! Bounded, TTL-aware presence tracker driving `CacheRange` lifecycle
//!
//! `EntryCache` does not hold the `CacheRange`s themselves — that is `RangeCacheManager`'s
//! `persisted: DashMap<RemotePath, Arc<CacheRange>>` (the per-path storage). `EntryCache`
//! is purely the access-ordered lifecycle clock: it tracks which paths are "present" and
//! decides, via capacity and TTL, when a path's turn is up. The teacher's own
//! multi-layer caches lean on `DashMap` plus hand-rolled atomic timestamps to approximate
//! LRU (`memory_cache.rs`, `lockfree_cache.rs`); that gives an approximate recency order
//! but not a hard bound on live entry count, which this cache needs
//! (`max_cached_entries`). `lru::LruCache` already appears in the corpus (`ngdp-patch`,
//! `rfs-cache`) for exactly this bounded+ordered shape, so it is used here behind a
//! `parking_lot::Mutex` rather than reinventing the bookkeeping.

use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use lru::LruCache;
use parking_lot::Mutex;

use crate::path::RemotePath;

/// Bounded, TTL-on-access set of "present" `RemotePath`s. Eviction (capacity or TTL)
/// invokes a removal hook with the evicted path; the hook is expected to tear down that
/// path's `CacheRange` and schedule its files for deletion.
pub struct EntryCache {
    inner: Mutex<LruCache<RemotePath, Instant>>,
    ttl: Duration,
}

impl EntryCache {
    /// A tracker holding at most `capacity` paths, each evicted after `ttl` of
    /// inactivity
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Mark `path` as just accessed, creating a presence entry if absent. If `path` had
    /// gone stale since its last touch, it is evicted (via `on_evict`) before being
    /// re-inserted fresh, matching "replacement by an identical key is a no-op" only in
    /// the sense that the caller sees a live entry either way — the stale instance's
    /// underlying range is still torn down.
    pub fn touch(&self, path: &RemotePath, mut on_evict: impl FnMut(RemotePath)) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(&last) = inner.peek(path)
            && now.duration_since(last) >= self.ttl
        {
            inner.pop(path);
            on_evict(path.clone());
        }

        if inner.get_mut(path).is_some() {
            inner.put(path.clone(), now);
            return;
        }

        if let Some((evicted_path, _)) = inner.push(path.clone(), now) {
            // `push` only returns Some when it displaced a *different* key to respect
            // capacity; the just-inserted key is never the one handed back.
            on_evict(evicted_path);
        }
    }

    /// Remove `path`'s presence entry immediately, without waiting for TTL or capacity
    /// eviction. Does not itself invoke any removal hook — callers that need the
    /// teardown side effect should run it themselves alongside this call.
    pub fn remove(&self, path: &RemotePath) -> bool {
        self.inner.lock().pop(path).is_some()
    }

    /// Number of paths currently tracked as present
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no paths are currently tracked
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sweep every tracked path and evict those idle for at least `ttl`, invoking
    /// `on_evict` for each. Used by the manager's periodic background sweep so that idle
    /// paths are reclaimed even without further `get`/`put` traffic against them.
    pub fn sweep_expired(&self, on_evict: impl Fn(RemotePath)) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let stale: Vec<RemotePath> = inner
            .iter()
            .filter(|(_, &last)| now.duration_since(last) >= self.ttl)
            .map(|(path, _)| path.clone())
            .collect();

        for path in stale {
            if inner.pop(&path).is_some() {
                on_evict(path);
            }
        }
    }
}
