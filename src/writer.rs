//! `put` — admission and the merge protocol
//!
//! Admission is synchronous and cheap (a counter check plus a buffer copy); the actual
//! disk work — the two-phase-commit merge described in the module's design notes — runs
//! on the write-executor so `put` never blocks its caller on I/O.

use std::{
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Arc,
};

use bytes::Bytes;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::{
    manager::{delete_best_effort, Inner, RangeCacheManager},
    path::ReadRequest,
    range::{CacheRange, LocalCacheFile, RangeEntry},
};

/// Decrements `in_memory_retained_bytes` when dropped, guaranteeing the admission
/// counter unwinds even if the flush task panics (§4.4's "finally-style guarantee").
struct InFlightGuard {
    inner: Arc<Inner>,
    bytes: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.stats.sub_in_memory_retained_bytes(self.bytes);
    }
}

impl RangeCacheManager {
    /// Admit `data` (exactly `request.length` bytes) as a candidate cache entry for
    /// `request`'s range, and hand off the merge to the write-executor. May silently
    /// drop the write under memory pressure; never returns an error to the caller.
    pub fn put(&self, request: &ReadRequest, data: Bytes) {
        if request.length == 0 {
            return;
        }

        let size = u64::from(request.length);
        let retained = self.stats.in_memory_retained_bytes();
        if retained + size >= self.config.max_in_memory_cache_size {
            warn!(
                path = %request.path,
                requested = size,
                retained,
                watermark = self.config.max_in_memory_cache_size,
                "put: rejected, in-flight memory watermark would be exceeded"
            );
            return;
        }

        self.stats.add_in_memory_retained_bytes(size);

        let inner = Arc::clone(&self.0);
        let request = request.clone();
        self.0.write_exec.submit(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                bytes: size,
            };
            flush(&inner, &request, data).await;
        });
    }
}

async fn flush(inner: &Arc<Inner>, request: &ReadRequest, data: Bytes) {
    let range = Arc::clone(
        inner
            .persisted
            .entry(request.path.clone())
            .or_insert_with(|| Arc::new(CacheRange::new()))
            .value(),
    );

    // Touch only after `persisted` carries this path's range, so the EntryCache entry
    // and the `persisted` entry are always created together. A path must never be
    // reachable from `persisted` without a live EntryCache entry to govern its lifetime.
    inner.touch(request.path.clone());

    let offset = request.offset;
    let end = request.end();

    // Phase 1 — optimistic snapshot.
    let prev = offset.checked_sub(1).and_then(|p| range.point(p));
    let next = range.point(end);

    // Phase 2 — early exit: already covered by a single existing range.
    if let (Some(prev), Some(next)) = (&prev, &next)
        && prev.file == next.file
    {
        trace!(path = %request.path, "put: already covered by a single range, no-op");
        return;
    }

    // Phase 3 — build the merged file with no locks held.
    let base_directory = inner.config.base_directory.clone();
    let new_path = base_directory.join(format!("{}.cache", Uuid::new_v4()));

    let built = {
        let new_path = new_path.clone();
        let prev = prev.clone();
        let next = next.clone();
        let data = data.clone();
        tokio::task::spawn_blocking(move || build_merged_file(&new_path, offset, end, prev.as_ref(), next.as_ref(), &data))
            .await
    };

    let built = match built {
        Ok(Ok(built)) => built,
        Ok(Err(err)) => {
            warn!(path = %request.path, error = %err, "put: flush failed, discarding");
            delete_best_effort(&new_path).await;
            return;
        }
        Err(err) => {
            warn!(path = %request.path, error = %err, "put: flush task panicked, discarding");
            delete_best_effort(&new_path).await;
            return;
        }
    };

    let Some((new_start, new_len)) = built else {
        // tail_len <= 0: new range already nested inside `prev`; nothing to commit.
        trace!(path = %request.path, "put: fully covered by prev, no-op");
        delete_best_effort(&new_path).await;
        return;
    };

    // Phase 4 — commit under the write lock, validating the snapshot is still current.
    let prev_now = offset.checked_sub(1).and_then(|p| range.point(p));
    let next_now = range.point(end);

    let updated = prev_now == prev && next_now == next;
    let to_delete;

    if updated {
        // `[new_start, new_start + new_len)` is a superset of `[offset, end)` and of
        // `prev`/`next`'s intervals, so the entries `replace` displaces are exactly the
        // files superseded by this merge — the interior entries `query(offset, end)`
        // would find, plus `prev` and `next` themselves, with no double-counting.
        let displaced = range.replace(
            new_start,
            new_start + new_len,
            LocalCacheFile {
                start_offset: new_start,
                local_path: new_path.clone(),
            },
        );
        to_delete = displaced.into_iter().map(|e| e.file).collect();
    } else {
        trace!(path = %request.path, "put: racing writer committed first, discarding");
        to_delete = vec![LocalCacheFile {
            start_offset: new_start,
            local_path: new_path.clone(),
        }];
    }

    // Phase 5 — cleanup outside any lock.
    for file in to_delete {
        delete_best_effort(&file.local_path).await;
    }
}

/// Builds the contiguous merged file at `new_path` and returns its `(start, length)`, or
/// `None` if the new range is already fully covered by `prev` and nothing was written.
fn build_merged_file(
    new_path: &Path,
    offset: u64,
    end: u64,
    prev: Option<&RangeEntry>,
    next: Option<&RangeEntry>,
    data: &[u8],
) -> std::io::Result<Option<(u64, u64)>> {
    let (new_start, mut new_len) = match prev {
        None => {
            write_new(new_path, data)?;
            (offset, end - offset)
        }
        Some(prev) => {
            let prev_len = on_disk_len(&prev.file.local_path)?;
            let prev_start = prev.file.start_offset;
            let tail_len = (end as i128) - (prev_start as i128 + prev_len as i128);

            if tail_len <= 0 {
                return Ok(None);
            }

            // `prev` overlaps `[offset, end)` whenever `offset < prev_start + prev_len`;
            // the incoming write always supersedes its own range, so only the portion of
            // `prev` strictly before `offset` survives. When the two ranges merely touch
            // (offset == prev_start + prev_len) this prefix is all of `prev` and nothing
            // is discarded.
            let prefix_len = offset - prev_start;
            copy_prefix(&prev.file.local_path, new_path, prefix_len)?;
            append(new_path, data)?;

            (prev_start, prefix_len + data.len() as u64)
        }
    };

    if let Some(next) = next {
        let skip = end - next.file.start_offset;
        let tail = read_from(&next.file.local_path, skip)?;
        new_len += tail.len() as u64;
        append(new_path, &tail)?;
    }

    Ok(Some((new_start, new_len)))
}

fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)
}

fn append(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
    file.write_all(data)
}

/// Copies the first `len` bytes of `from` into a newly-created `to`.
fn copy_prefix(from: &Path, to: &Path, len: u64) -> std::io::Result<()> {
    let mut src = std::fs::File::open(from)?;
    let mut dst = std::fs::OpenOptions::new().write(true).create_new(true).open(to)?;
    std::io::copy(&mut src.by_ref().take(len), &mut dst)?;
    Ok(())
}

fn read_from(path: &Path, start: u64) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn on_disk_len(path: &Path) -> std::io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}
