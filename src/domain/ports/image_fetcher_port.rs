//! Port definition for fetching images from their origin.

use async_trait::async_trait;

use crate::domain::entities::ImageHandle;
use crate::domain::errors::CacheResult;

/// Port for fetching, decoding and size-bounding a remote image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches the image at `url`.
    ///
    /// # Errors
    /// Returns `NetworkError` on connection, timeout or I/O failure and
    /// `DecodeError` when the body is not a valid image.
    async fn fetch(&self, url: &str) -> CacheResult<ImageHandle>;
}
