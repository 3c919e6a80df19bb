//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, ImageHandle, ImageSource, LoadedImage, RequestStatus};
pub use errors::{CacheError, CacheResult};
pub use ports::{ImageCachePort, ImageFetcher, ImageSink};
