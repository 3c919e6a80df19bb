//! Immutable loader configuration and its builder.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::entities::ImageHandle;

use super::disk_cache::default_cache_dir;
use super::downloader::{BoundingBox, DEFAULT_TIMEOUT};
use super::memory_cache::DEFAULT_CACHE_SIZE;
use super::worker_pool::{DEFAULT_POOL_SIZE, ShutdownPolicy};

/// Configuration snapshot consumed by [`ImageLoader`](super::ImageLoader).
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Keep decoded images in memory.
    pub memory_cache_enabled: bool,
    /// Maximum number of images held in memory.
    pub memory_cache_capacity: usize,
    /// Persist images on disk.
    pub disk_cache_enabled: bool,
    /// Directory holding one file per key.
    pub disk_cache_dir: PathBuf,
    /// Number of concurrent fetch tasks.
    pub worker_pool_size: usize,
    /// Largest size a fetched image is kept at.
    pub bounds: BoundingBox,
    /// Connect timeout for the HTTP client.
    pub connect_timeout: Duration,
    /// Read timeout for the HTTP client.
    pub read_timeout: Duration,
    /// Shown while a request is waiting on disk or network.
    pub placeholder_on_loading: Option<ImageHandle>,
    /// Shown when a request fails.
    pub placeholder_on_fail: Option<ImageHandle>,
    /// Log where each request was served from.
    pub debug_logging: bool,
    /// What happens to pending work on release.
    pub shutdown_policy: ShutdownPolicy,
}

impl LoaderOptions {
    /// Starts building options from the defaults.
    #[must_use]
    pub fn builder() -> LoaderOptionsBuilder {
        LoaderOptionsBuilder::default()
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            memory_cache_enabled: false,
            memory_cache_capacity: DEFAULT_CACHE_SIZE,
            disk_cache_enabled: false,
            disk_cache_dir: default_cache_dir(),
            worker_pool_size: DEFAULT_POOL_SIZE,
            bounds: BoundingBox::default(),
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            placeholder_on_loading: None,
            placeholder_on_fail: None,
            debug_logging: false,
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

/// Fluent builder for [`LoaderOptions`].
#[derive(Debug, Clone, Default)]
pub struct LoaderOptionsBuilder {
    options: LoaderOptions,
}

impl LoaderOptionsBuilder {
    /// Enables or disables the memory cache.
    #[must_use]
    pub const fn cache_in_memory(mut self, enabled: bool) -> Self {
        self.options.memory_cache_enabled = enabled;
        self
    }

    /// Sets how many images the memory cache holds.
    #[must_use]
    pub const fn memory_cache_capacity(mut self, capacity: usize) -> Self {
        self.options.memory_cache_capacity = capacity;
        self
    }

    /// Enables or disables the disk cache.
    #[must_use]
    pub const fn cache_on_disk(mut self, enabled: bool) -> Self {
        self.options.disk_cache_enabled = enabled;
        self
    }

    /// Sets the disk cache directory.
    #[must_use]
    pub fn disk_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.disk_cache_dir = dir.into();
        self
    }

    /// Sets the number of concurrent fetch tasks.
    #[must_use]
    pub const fn worker_pool_size(mut self, size: usize) -> Self {
        self.options.worker_pool_size = size;
        self
    }

    /// Sets the bounding box fetched images are scaled into.
    #[must_use]
    pub const fn max_size(mut self, width: f32, height: f32) -> Self {
        self.options.bounds = BoundingBox::new(width, height);
        self
    }

    /// Sets the HTTP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the HTTP read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    /// Sets the placeholder shown while loading.
    #[must_use]
    pub fn show_image_on_loading(mut self, image: ImageHandle) -> Self {
        self.options.placeholder_on_loading = Some(image);
        self
    }

    /// Sets the placeholder shown on failure.
    #[must_use]
    pub fn show_image_on_fail(mut self, image: ImageHandle) -> Self {
        self.options.placeholder_on_fail = Some(image);
        self
    }

    /// Enables per-request debug logs.
    #[must_use]
    pub const fn debug_logging(mut self, enabled: bool) -> Self {
        self.options.debug_logging = enabled;
        self
    }

    /// Sets the shutdown policy of the worker pool.
    #[must_use]
    pub const fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.options.shutdown_policy = policy;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> LoaderOptions {
        self.options
    }
}
