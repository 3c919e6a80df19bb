//! Infrastructure layer with cache, network and configuration adapters.

/// Application configuration.
pub mod config;
/// Image handling (caching, fetching, loading).
pub mod image;

pub use config::{AppConfig, CliArgs, Command, ConfigError, ConfigStore, LoaderConfig, LogLevel};
pub use image::{
    BoundingBox, CacheStats, DiskImageCache, HttpImageFetcher, ImageLoader, LoaderOptions,
    LoaderOptionsBuilder, MemoryImageCache, ShutdownPolicy, WorkerPool,
};
