//! Port definition for in-memory image caching.

use crate::domain::entities::{CacheKey, ImageHandle};

/// Port for a key to image cache held in memory.
///
/// Implementations must be thread-safe and must never suspend: every method is
/// a short critical section around an in-memory map. An entry may disappear
/// without an explicit `remove` (eviction), which callers observe as a miss.
pub trait ImageCachePort: Send + Sync {
    /// Attempts to get an image from the cache.
    /// Returns None if not cached.
    fn get(&self, key: &CacheKey) -> Option<ImageHandle>;

    /// Stores an image in the cache. Always succeeds.
    fn put(&self, key: CacheKey, image: ImageHandle);

    /// Removes an image from the cache, returning it if it was resident.
    fn remove(&self, key: &CacheKey) -> Option<ImageHandle>;

    /// Returns a snapshot of the currently resident keys.
    fn keys(&self) -> Vec<CacheKey>;

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all images from the cache.
    fn clear(&self);
}
