//! Image cache and loader error types.

use thiserror::Error;

/// Result type for cache and loader operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while caching or loading images.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Cache tier could not be initialised (directory missing or read-only).
    #[error("Init error: {0}")]
    InitError(String),
    /// Connection, timeout or I/O failure while fetching.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Fetched bytes are not a valid image.
    #[error("Decode error: {0}")]
    DecodeError(String),
    /// Disk cache write failed.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Other I/O error during a cache operation.
    #[error("IO error: {0}")]
    IoError(String),
    /// Key cannot be used as a cache filename.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
    /// Worker pool has been shut down.
    #[error("Worker pool is shut down")]
    PoolShutDown,
    /// A worker task panicked.
    #[error("Worker task failed: {0}")]
    WorkerFault(String),
    /// Loading produced no image.
    #[error("Failed to load image for key {0:?}")]
    LoadFailed(String),
}

impl CacheError {
    /// Returns whether the error came from the fetch itself (network or
    /// decode), as opposed to a cache tier or the worker pool.
    #[must_use]
    pub const fn is_fetch_error(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::DecodeError(_))
    }
}
