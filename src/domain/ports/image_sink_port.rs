//! Port for receiving the result of an image request.

use crate::domain::entities::{CacheKey, ImageHandle, LoadedImage};

/// Receiver of image request results (typically a UI widget).
///
/// Callbacks are invoked on the loader's delivery task, never on the thread
/// that called `request`, and never concurrently for the same loader. After the
/// loader is released, pending callbacks may never fire.
pub trait ImageSink: Send + Sync {
    /// Called once a request misses the memory cache, with the configured
    /// loading placeholder.
    fn on_loading(&self, _key: &CacheKey, _placeholder: &ImageHandle) {}

    /// Called with the loaded image.
    fn on_success(&self, key: &CacheKey, image: &LoadedImage);

    /// Called when no image could be produced, with the configured failure
    /// placeholder if any.
    fn on_failure(&self, key: &CacheKey, placeholder: Option<&ImageHandle>);
}
