//! `get` — the synchronous read path
//!
//! Deliberately blocking, plain `std::fs`: matching `archive_reader.rs`'s
//! seek-then-`read_exact` idiom for its non-mmap fallback (mmap is not used here since
//! cache files are transient and frequently rewritten, unlike the teacher's immutable
//! archives). A hot read path that is already going to block on I/O gains nothing from
//! `async`, so `get` never `.await`s.

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::{manager::RangeCacheManager, path::ReadRequest};

impl RangeCacheManager {
    /// Serve `request` from the local cache into
    /// `buffer[buffer_offset .. buffer_offset + request.length]`. Returns `true` and
    /// fills the buffer on a full hit; returns `false` (buffer contents undefined) on
    /// any miss, partial coverage, or I/O failure.
    pub fn get(&self, request: &ReadRequest, buffer: &mut [u8], buffer_offset: usize) -> bool {
        if request.length == 0 {
            return true;
        }

        let Some(end) = buffer_offset.checked_add(request.length as usize) else {
            debug!(path = %request.path, "get: buffer_offset + length overflows usize");
            self.stats.record_miss();
            return false;
        };
        if end > buffer.len() {
            debug!(path = %request.path, "get: destination buffer shorter than request");
            self.stats.record_miss();
            return false;
        }

        self.touch(request.path.clone());

        let Some(range) = self.persisted.get(&request.path) else {
            debug!(path = %request.path, "get: no cache range for path");
            self.stats.record_miss();
            return false;
        };

        let entries = range.query(request.offset, request.end());
        let fully_covers = entries.len() == 1 && entries[0].lo <= request.offset && entries[0].hi >= request.end();
        if !fully_covers {
            debug!(
                path = %request.path,
                offset = request.offset,
                length = request.length,
                matched = entries.len(),
                "get: request not covered by a single contiguous range"
            );
            self.stats.record_miss();
            return false;
        }
        let file = entries[0].file.clone();
        drop(range);

        match read_range(&file.local_path, request.offset - file.start_offset, &mut buffer[buffer_offset..end]) {
            Ok(()) => {
                debug!(path = %request.path, offset = request.offset, length = request.length, "get: hit");
                self.stats.record_hit();
                true
            }
            Err(err) => {
                debug!(path = %request.path, error = %err, "get: read failed, reporting as miss");
                self.stats.record_miss();
                false
            }
        }
    }
}

fn read_range(local_path: &std::path::Path, start: u64, into: &mut [u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::open(local_path)?;
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(into)
}
