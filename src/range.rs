//! The per-remote-file ordered interval map
//!
//! `CacheRange` is the storage half of the cache: a `BTreeMap<u64, Slot>` keyed by
//! interval start, giving O(log n) point lookups and range scans via `BTreeMap::range`,
//! wrapped in a `parking_lot::RwLock` (the lock the teacher crate already reaches for in
//! `ngdp-cache`, `ngdp-cdn`, `casc-storage`, and `cascette-client-storage`). Intervals
//! are half-open `[lo, hi)` and never overlap; `replace` is the only mutating operation
//! and is always called by the merge protocol in `writer.rs`, which itself never holds
//! this lock across file I/O.

use parking_lot::RwLock;
use std::{collections::BTreeMap, path::PathBuf};

/// A single contiguous chunk of a remote file, persisted at `local_path` starting at
/// `start_offset` of the remote file. Its on-disk length is the length of the interval
/// it is stored under in the owning [`CacheRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCacheFile {
    /// Offset within the remote file at which this local file starts
    pub start_offset: u64,
    /// Path to the local file on disk
    pub local_path: PathBuf,
}

/// One entry in a [`CacheRange`]: the half-open interval `[lo, hi)` and the file backing
/// it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    /// Inclusive lower bound of the interval
    pub lo: u64,
    /// Exclusive upper bound of the interval
    pub hi: u64,
    /// The local file backing this interval
    pub file: LocalCacheFile,
}

/// Map value: the interval's exclusive upper bound plus the backing file. `hi` is
/// tracked explicitly (rather than derived from `std::fs::metadata` on every lookup) so
/// that a lookup never races a concurrent append to the very file it names.
struct Slot {
    hi: u64,
    file: LocalCacheFile,
}

/// The ordered, non-overlapping interval map for one remote path
#[derive(Default)]
pub struct CacheRange {
    intervals: RwLock<BTreeMap<u64, Slot>>,
}

impl CacheRange {
    /// An empty range map
    pub fn new() -> Self {
        Self::default()
    }

    fn to_entry(lo: u64, slot: &Slot) -> RangeEntry {
        RangeEntry {
            lo,
            hi: slot.hi,
            file: slot.file.clone(),
        }
    }

    /// All entries whose interval intersects `[lo, hi)`, in ascending order of `lo`
    pub fn query(&self, lo: u64, hi: u64) -> Vec<RangeEntry> {
        let map = self.intervals.read();
        Self::query_locked(&map, lo, hi)
    }

    fn query_locked(map: &BTreeMap<u64, Slot>, lo: u64, hi: u64) -> Vec<RangeEntry> {
        if lo >= hi {
            return Vec::new();
        }

        let mut out = Vec::new();

        // An entry starting strictly before `lo` can still intersect [lo, hi) if its
        // own interval extends past `lo`; BTreeMap::range only yields starts in the
        // bound we give it, so the entry immediately preceding `lo` is checked first.
        if let Some((&start, slot)) = map.range(..lo).next_back()
            && slot.hi > lo
        {
            out.push(Self::to_entry(start, slot));
        }

        for (&start, slot) in map.range(lo..hi) {
            out.push(Self::to_entry(start, slot));
        }

        out
    }

    /// The entry whose interval contains point `p`, if any
    pub fn point(&self, p: u64) -> Option<RangeEntry> {
        let map = self.intervals.read();
        Self::point_locked(&map, p)
    }

    fn point_locked(map: &BTreeMap<u64, Slot>, p: u64) -> Option<RangeEntry> {
        let (&start, slot) = map.range(..=p).next_back()?;
        (p < slot.hi).then(|| Self::to_entry(start, slot))
    }

    /// Remove every entry whose interval intersects `[lo, hi)` and insert `[lo, hi) ->
    /// file`. Returns the removed entries so the caller can schedule their files for
    /// deletion.
    pub fn replace(&self, lo: u64, hi: u64, file: LocalCacheFile) -> Vec<RangeEntry> {
        let mut map = self.intervals.write();
        let displaced = Self::query_locked(&map, lo, hi);
        for entry in &displaced {
            map.remove(&entry.lo);
        }
        map.insert(lo, Slot { hi, file });
        displaced
    }

    /// Snapshot of every live entry, in ascending order. Used by eviction to collect
    /// every on-disk file that must be deleted.
    pub fn snapshot(&self) -> Vec<RangeEntry> {
        let map = self.intervals.read();
        map.iter().map(|(&lo, slot)| Self::to_entry(lo, slot)).collect()
    }

    /// Number of live intervals
    pub fn len(&self) -> usize {
        self.intervals.read().len()
    }

    /// Whether this range has no live intervals
    pub fn is_empty(&self) -> bool {
        self.intervals.read().is_empty()
    }
}
