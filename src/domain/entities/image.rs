//! Domain types for image loading and caching.

use std::sync::Arc;

/// Shared, immutable decoded image.
///
/// Tiers and callers share the same allocation; nothing mutates an image after
/// it has been decoded, so a clone of the handle behaves like an independent copy.
pub type ImageHandle = Arc<image::DynamicImage>;

/// Caller-assigned identifier for a logical image.
///
/// Used both as the memory cache key and, verbatim, as the disk cache filename.
/// Keys starting with `.~ail-tmp` are reserved for in-progress disk writes and
/// never reach the disk tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(pub String);

impl CacheKey {
    /// Creates a new `CacheKey` from any string-like input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates a `CacheKey` from a URL by hashing it.
    ///
    /// The result is always safe to use as a filename.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the key can be used as a single filename inside the
    /// cache directory without escaping it.
    #[must_use]
    pub fn is_filesystem_safe(&self) -> bool {
        let key = self.0.as_str();
        !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0'])
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from the in-memory cache.
    MemoryCache,
    /// Loaded from the disk cache.
    DiskCache,
    /// Downloaded from the network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A decoded image together with the tier that produced it.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Key the image was requested under.
    pub key: CacheKey,
    /// The decoded, size-bounded image.
    pub image: ImageHandle,
    /// Tier that served the request.
    pub source: ImageSource,
}

impl LoadedImage {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// What [`request`](crate::infrastructure::image::ImageLoader::request) did
/// before returning to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Served from the memory cache; delivery is already queued.
    MemoryHit,
    /// No fetch was running for the key; a new task was submitted.
    Dispatched,
    /// A fetch for the key was already in flight; the sink joined it.
    Joined,
    /// The worker pool no longer accepts work; a failure was delivered.
    Rejected,
}

impl RequestStatus {
    /// Returns true if the request started a new fetch task.
    #[must_use]
    pub const fn is_dispatched(self) -> bool {
        matches!(self, Self::Dispatched)
    }
}
