//! Async image loading orchestrator.
//!
//! Implements a three-tier lookup: Memory -> Disk -> Network. Concurrent
//! requests for a key that is already being fetched join the running fetch
//! instead of starting another one.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{CacheKey, ImageHandle, ImageSource, LoadedImage, RequestStatus};
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{ImageCachePort, ImageFetcher, ImageSink};

use super::delivery::{DeliveryEvent, DeliveryQueue};
use super::disk_cache::DiskImageCache;
use super::downloader::HttpImageFetcher;
use super::memory_cache::MemoryImageCache;
use super::options::LoaderOptions;
use super::worker_pool::{ShutdownPolicy, WorkerPool};

type Waiters = Vec<Arc<dyn ImageSink>>;

/// Orchestrates image loading from memory, disk, and network.
///
/// `request` never blocks: it answers memory hits straight away and hands
/// everything else to the worker pool. Results reach sinks through a single
/// delivery task.
pub struct ImageLoader {
    core: Arc<LoaderCore>,
    pool: WorkerPool,
}

/// State shared between the loader and its worker tasks.
struct LoaderCore {
    options: LoaderOptions,
    memory_cache: Option<Arc<MemoryImageCache>>,
    disk_cache: Option<Arc<DiskImageCache>>,
    fetcher: Arc<dyn ImageFetcher>,
    in_flight: Mutex<HashMap<CacheKey, Waiters>>,
    delivery: DeliveryQueue,
    /// Set by `release`; fetches finishing afterwards skip the memory tier.
    released: AtomicBool,
    /// Set by `release(true)`; fetches finishing afterwards skip the disk tier.
    disk_released: AtomicBool,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("options", &self.core.options)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader that fetches over HTTP.
    ///
    /// Must be called from within a tokio runtime; the loader's tasks run on
    /// that runtime even when `request` is called from other threads.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created. A disk cache that
    /// cannot be opened only disables the disk tier.
    pub async fn new(options: LoaderOptions) -> CacheResult<Self> {
        let fetcher = HttpImageFetcher::new(
            options.bounds,
            options.connect_timeout,
            options.read_timeout,
        )?;
        Ok(Self::with_fetcher(options, Arc::new(fetcher)).await)
    }

    /// Creates a loader backed by a custom fetcher.
    pub async fn with_fetcher(options: LoaderOptions, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let memory_cache = options
            .memory_cache_enabled
            .then(|| Arc::new(MemoryImageCache::new(options.memory_cache_capacity)));

        let disk_cache = if options.disk_cache_enabled {
            match DiskImageCache::new(options.disk_cache_dir.clone()).await {
                Ok(cache) => Some(Arc::new(cache)),
                Err(e) => {
                    warn!(error = %e, "Cannot open disk cache, disk caching disabled");
                    None
                }
            }
        } else {
            None
        };

        let runtime = Handle::current();
        let pool = WorkerPool::new(
            options.worker_pool_size,
            options.shutdown_policy,
            runtime.clone(),
        );

        info!(
            memory = memory_cache.is_some(),
            disk = disk_cache.is_some(),
            workers = pool.size(),
            "Image loader ready"
        );

        Self {
            core: Arc::new(LoaderCore {
                options,
                memory_cache,
                disk_cache,
                fetcher,
                in_flight: Mutex::new(HashMap::new()),
                delivery: DeliveryQueue::start(&runtime),
                released: AtomicBool::new(false),
                disk_released: AtomicBool::new(false),
            }),
            pool,
        }
    }

    /// Requests an image; the result is delivered to `sink`.
    ///
    /// Returns immediately. A memory hit is queued for delivery at once;
    /// otherwise the sink joins the fetch already running for `key` or a new
    /// one is submitted to the worker pool.
    pub fn request(
        &self,
        key: impl Into<CacheKey>,
        url: impl Into<String>,
        sink: Arc<dyn ImageSink>,
    ) -> RequestStatus {
        let key = key.into();
        let core = &self.core;

        if let Some(image) = core.memory_cache.as_ref().and_then(|cache| cache.get(&key)) {
            let loaded = LoadedImage {
                key: key.clone(),
                image,
                source: ImageSource::MemoryCache,
            };
            core.log_loaded(&loaded);
            core.delivery.send(sink, key, DeliveryEvent::Success(loaded));
            return RequestStatus::MemoryHit;
        }

        if let Some(placeholder) = &core.options.placeholder_on_loading {
            core.delivery.send(
                sink.clone(),
                key.clone(),
                DeliveryEvent::Loading(placeholder.clone()),
            );
        }

        match core.in_flight.lock().entry(key.clone()) {
            Entry::Occupied(mut waiters) => {
                waiters.get_mut().push(sink);
                trace!(key = %key, waiters = waiters.get().len(), "Joined in-flight request");
                return RequestStatus::Joined;
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![sink]);
            }
        }

        let url = url.into();
        let task_core = Arc::clone(core);
        let task_key = key.clone();
        let fault_core = Arc::clone(core);
        let fault_key = key.clone();

        let submitted = self.pool.submit(
            async move { task_core.run_fetch(task_key, url).await },
            move |message| fault_core.complete(&fault_key, Err(CacheError::WorkerFault(message))),
        );

        match submitted {
            Ok(()) => {
                trace!(key = %key, "Dispatched fetch");
                RequestStatus::Dispatched
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Rejected image request");
                core.complete(&key, Err(e));
                RequestStatus::Rejected
            }
        }
    }

    /// Loads an image and waits for the result.
    ///
    /// # Errors
    /// Returns `LoadFailed` if no image could be produced or the loader was
    /// released before the result arrived.
    pub async fn load(
        &self,
        key: impl Into<CacheKey>,
        url: impl Into<String>,
    ) -> CacheResult<LoadedImage> {
        let key = key.into();
        let (sink, rx) = OneshotSink::new();
        self.request(key.clone(), url, sink);
        rx.await
            .ok()
            .flatten()
            .ok_or_else(|| CacheError::LoadFailed(key.to_string()))
    }

    /// Returns the options the loader was built with.
    #[must_use]
    pub fn options(&self) -> &LoaderOptions {
        &self.core.options
    }

    /// Returns the memory tier, if enabled.
    #[must_use]
    pub fn memory_cache(&self) -> Option<&Arc<MemoryImageCache>> {
        self.core.memory_cache.as_ref()
    }

    /// Returns the disk tier, if enabled and usable.
    #[must_use]
    pub fn disk_cache(&self) -> Option<&Arc<DiskImageCache>> {
        self.core.disk_cache.as_ref()
    }

    /// Returns the worker pool.
    #[must_use]
    pub const fn worker_pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Returns true if a fetch for `key` is in flight.
    #[must_use]
    pub fn is_loading(&self, key: &CacheKey) -> bool {
        self.core.in_flight.lock().contains_key(key)
    }

    /// Returns the number of keys with a fetch in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.core.in_flight.lock().len()
    }

    /// Clears the memory cache.
    pub fn clear_memory_cache(&self) {
        if let Some(cache) = &self.core.memory_cache {
            cache.clear();
        }
    }

    /// Clears the disk cache. Failures are logged.
    pub async fn clear_disk_cache(&self) {
        if let Some(cache) = &self.core.disk_cache {
            match cache.clear().await {
                Ok(removed) => debug!(removed = removed, "Cleared disk image cache"),
                Err(e) => warn!(error = %e, "Failed to clear disk cache"),
            }
        }
    }

    /// Stops the worker pool and clears the memory cache, plus the disk cache
    /// when `clear_disk` is set. Safe to call more than once.
    ///
    /// Callbacks for requests that were already dispatched may never fire.
    pub async fn release(&self, clear_disk: bool) {
        if self.core.options.debug_logging {
            debug!(clear_disk = clear_disk, "Releasing image loader");
        }
        if clear_disk {
            self.core.disk_released.store(true, Ordering::Release);
        }
        self.core.released.store(true, Ordering::Release);
        self.pool.shutdown();
        if self.core.options.shutdown_policy == ShutdownPolicy::Abort {
            let dropped = std::mem::take(&mut *self.core.in_flight.lock());
            if !dropped.is_empty() {
                debug!(count = dropped.len(), "Dropped in-flight requests");
            }
        }
        if clear_disk {
            self.clear_disk_cache().await;
        }
        self.clear_memory_cache();
        info!("Released image loader");
    }
}

impl LoaderCore {
    /// Body of a worker task: resolve the image, then notify every waiter.
    async fn run_fetch(self: Arc<Self>, key: CacheKey, url: String) {
        let result = self.resolve(&key, &url).await;
        self.complete(&key, result);
    }

    async fn resolve(&self, key: &CacheKey, url: &str) -> CacheResult<LoadedImage> {
        // A fetch that finished after the caller's memory probe may already
        // have filled the memory tier.
        if let Some(image) = self.memory_cache.as_ref().and_then(|cache| cache.get(key)) {
            return Ok(Self::loaded(key, image, ImageSource::MemoryCache));
        }

        if let Some(disk) = &self.disk_cache
            && let Some(image) = disk.get(key).await
        {
            self.remember(key, &image);
            return Ok(Self::loaded(key, image, ImageSource::DiskCache));
        }

        let image = self.fetcher.fetch(url).await?;

        self.remember(key, &image);

        if let Some(disk) = &self.disk_cache
            && !self.disk_released.load(Ordering::Acquire)
        {
            if let Err(e) = disk.save(key, &image).await {
                warn!(key = %key, error = %e, "Failed to cache image on disk");
            } else if self.disk_released.load(Ordering::Acquire) {
                disk.remove(key).await;
            }
        }

        Ok(Self::loaded(key, image, ImageSource::Network))
    }

    /// Puts `image` in the memory tier unless the loader has been released.
    fn remember(&self, key: &CacheKey, image: &ImageHandle) {
        let Some(memory) = &self.memory_cache else {
            return;
        };
        if self.released.load(Ordering::Acquire) {
            return;
        }
        memory.put(key.clone(), image.clone());
        // `release` may have cleared memory between the check and the put.
        if self.released.load(Ordering::Acquire) {
            memory.remove(key);
        }
    }

    fn loaded(key: &CacheKey, image: ImageHandle, source: ImageSource) -> LoadedImage {
        LoadedImage {
            key: key.clone(),
            image,
            source,
        }
    }

    /// Removes the in-flight entry for `key` and notifies all of its waiters.
    fn complete(&self, key: &CacheKey, result: CacheResult<LoadedImage>) {
        let waiters = self.in_flight.lock().remove(key).unwrap_or_default();

        match result {
            Ok(loaded) => {
                self.log_loaded(&loaded);
                for sink in waiters {
                    self.delivery
                        .send(sink, key.clone(), DeliveryEvent::Success(loaded.clone()));
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, waiters = waiters.len(), "Failed to load image");
                for sink in waiters {
                    self.delivery.send(
                        sink,
                        key.clone(),
                        DeliveryEvent::Failure(self.options.placeholder_on_fail.clone()),
                    );
                }
            }
        }
    }

    fn log_loaded(&self, loaded: &LoadedImage) {
        if self.options.debug_logging {
            debug!(
                key = %loaded.key,
                source = %loaded.source,
                width = loaded.width(),
                height = loaded.height(),
                "Loaded image"
            );
        } else {
            trace!(key = %loaded.key, source = %loaded.source, "Loaded image");
        }
    }
}

/// Sink forwarding a single result to a oneshot channel.
struct OneshotSink {
    tx: Mutex<Option<oneshot::Sender<Option<LoadedImage>>>>,
}

impl OneshotSink {
    fn new() -> (Arc<Self>, oneshot::Receiver<Option<LoadedImage>>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    fn finish(&self, result: Option<LoadedImage>) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(result);
        }
    }
}

impl ImageSink for OneshotSink {
    fn on_success(&self, _key: &CacheKey, image: &LoadedImage) {
        self.finish(Some(image.clone()));
    }

    fn on_failure(&self, _key: &CacheKey, _placeholder: Option<&ImageHandle>) {
        self.finish(None);
    }
}
