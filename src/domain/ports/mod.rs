//! Port definitions for the image pipeline.

mod image_cache_port;
mod image_fetcher_port;
mod image_sink_port;

pub use image_cache_port::ImageCachePort;
pub use image_fetcher_port::ImageFetcher;
pub use image_sink_port::ImageSink;

#[cfg(test)]
pub mod mocks {
    pub use super::image_fetcher_port::MockImageFetcher;
    pub use super::image_sink_port::mock::{RecordingSink, SinkEvent};
}
