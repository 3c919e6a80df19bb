//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction
//! - Disk caching for persistence
//! - HTTP fetching with decode and downscale
//! - A bounded worker pool and serialised result delivery
//! - The loader that ties the tiers together

pub mod delivery;
pub mod disk_cache;
pub mod downloader;
pub mod loader;
pub mod memory_cache;
pub mod options;
pub mod worker_pool;

pub use delivery::DeliveryEvent;
pub use disk_cache::{DiskImageCache, JPEG_QUALITY, TEMP_PREFIX, default_cache_dir};
pub use downloader::{BoundingBox, HttpImageFetcher, decode_and_fit, downscale_to_fit, fit_within};
pub use loader::ImageLoader;
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use options::{LoaderOptions, LoaderOptionsBuilder};
pub use worker_pool::{ShutdownPolicy, WorkerPool};
