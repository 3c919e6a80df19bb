//! Domain entity definitions.

mod image;

pub use image::{CacheKey, ImageHandle, ImageSource, LoadedImage, RequestStatus};
