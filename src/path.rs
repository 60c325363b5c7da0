//! Remote path and read-request types
//!
//! `RemotePath` is a deliberately thin newtype: the teacher crate's `CacheKey` trait
//! layers Jenkins96/fast-hash machinery on top of its key types because NGDP lookups are
//! extremely hot and keyed by content hash. Nothing here is content-addressed, so a
//! plain `String` wrapper with the usual `Hash`/`Eq` derives is all `DashMap` and
//! `lru::LruCache` need.

use std::fmt;

use crate::error::CacheError;

/// Opaque identifier of a remote file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    /// Wrap a path-like string as a cache key
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Borrow the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RemotePath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RemotePath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A request to read `length` bytes starting at `offset` of `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// The remote file being read
    pub path: RemotePath,
    /// Byte offset within the remote file
    pub offset: u64,
    /// Number of bytes requested
    pub length: u32,
}

impl ReadRequest {
    /// Construct a request, rejecting one whose `offset + length` would overflow `u64`
    pub fn new(path: RemotePath, offset: u64, length: u32) -> Result<Self, CacheError> {
        offset
            .checked_add(u64::from(length))
            .ok_or_else(|| CacheError::InvalidRequest("offset + length overflows u64".into()))?;
        Ok(Self {
            path,
            offset,
            length,
        })
    }

    /// The end of the requested interval (exclusive), i.e. `offset + length`
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }
}
