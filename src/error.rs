//! Error types for range cache operations

use thiserror::Error;

/// Errors that can occur while constructing or operating a [`crate::RangeCacheManager`]
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache could not be constructed: the base directory does not exist and could
    /// not be created, or the supplied configuration failed validation.
    #[error("cache configuration error: {0}")]
    Configuration(String),

    /// A caller-supplied request was malformed (e.g. `offset + length` overflows `u64`,
    /// or the destination buffer is shorter than `buffer_offset + length`).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An I/O failure. Most I/O failures inside the cache are handled locally (a read
    /// failure becomes a miss, a flush failure is logged and the write abandoned) and
    /// never reach a caller as this variant; it surfaces only from paths that return a
    /// `Result` directly, such as [`crate::RangeCacheManager::new`].
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for cache operations that can fail
pub type CacheResult<T> = Result<T, CacheError>;
