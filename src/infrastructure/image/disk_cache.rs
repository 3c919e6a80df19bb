//! Disk-based image cache for persistence across sessions.
//!
//! Every key maps to exactly one file directly under the cache directory,
//! named after the key verbatim and holding a JPEG encoding of the image.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use tokio::fs;
use tracing::{debug, error, trace, warn};

use crate::domain::entities::{CacheKey, ImageHandle};
use crate::domain::errors::{CacheError, CacheResult};

/// JPEG quality used for every cached file.
pub const JPEG_QUALITY: u8 = 80;

/// Prefix of in-progress writes and write probes; such files are never read
/// as entries.
pub const TEMP_PREFIX: &str = ".~ail-tmp";

/// Disk-based image cache that persists encoded images.
#[derive(Debug)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
}

impl DiskImageCache {
    /// Opens a cache in the specified directory, creating it if needed.
    ///
    /// # Errors
    /// Returns `InitError` if the directory cannot be created or written to.
    pub async fn new(cache_dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir).await.map_err(|e| {
            CacheError::InitError(format!(
                "Failed to create cache dir {}: {e}",
                cache_dir.display()
            ))
        })?;

        let probe = cache_dir.join(format!("{TEMP_PREFIX}-probe-{}", uuid::Uuid::new_v4()));
        fs::write(&probe, b"").await.map_err(|e| {
            CacheError::InitError(format!(
                "Cache dir {} is not writable: {e}",
                cache_dir.display()
            ))
        })?;
        if let Err(e) = fs::remove_file(&probe).await {
            warn!(path = %probe.display(), error = %e, "Failed to remove write probe");
        }

        debug!(path = %cache_dir.display(), "Opened disk image cache");
        Ok(Self { cache_dir })
    }

    /// Opens a cache in the default location (the platform cache directory).
    ///
    /// # Errors
    /// Returns `InitError` if the cache directory cannot be created.
    pub async fn default_location() -> CacheResult<Self> {
        Self::new(default_cache_dir()).await
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path for a cached image, or `None` if the key would not
    /// name a file directly inside the cache directory.
    fn cache_path(&self, key: &CacheKey) -> Option<PathBuf> {
        if key.is_filesystem_safe() && !key.as_str().starts_with(TEMP_PREFIX) {
            Some(self.cache_dir.join(key.as_str()))
        } else {
            None
        }
    }

    /// Gets the encoded bytes of a cached image.
    pub async fn get_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.cache_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Err(_) => {
                trace!(key = %key, "Disk cache miss");
                None
            }
        }
    }

    /// Loads and decodes an image from disk cache.
    ///
    /// A file that cannot be decoded is reported as absent.
    pub async fn get(&self, key: &CacheKey) -> Option<ImageHandle> {
        let bytes = self.get_bytes(key).await?;

        let result = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await;

        match result {
            Ok(Ok(img)) => {
                debug!(key = %key, "Decoded image from disk cache");
                Some(ImageHandle::new(img))
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to decode cached image");
                None
            }
            Err(e) => {
                error!(key = %key, error = %e, "Decode task panicked");
                None
            }
        }
    }

    /// Encodes and stores an image, replacing any previous file for the key.
    ///
    /// Readers observe either the previous file or the complete new one.
    ///
    /// # Errors
    /// Returns `InvalidKey` for keys that are not plain filenames and
    /// `WriteError` if encoding or writing fails.
    pub async fn save(&self, key: &CacheKey, image: &ImageHandle) -> CacheResult<()> {
        let path = self
            .cache_path(key)
            .ok_or_else(|| CacheError::InvalidKey(key.to_string()))?;
        let dir = self.cache_dir.clone();
        let image = image.clone();

        let size = tokio::task::spawn_blocking(move || {
            let bytes = encode_jpeg(&image)?;
            write_atomic(&dir, &path, &bytes)?;
            Ok::<_, CacheError>(bytes.len())
        })
        .await
        .map_err(|e| CacheError::WriteError(format!("Encode task panicked: {e}")))??;

        debug!(key = %key, size = size, "Stored image in disk cache");
        Ok(())
    }

    /// Removes an image from disk cache.
    ///
    /// Returns true only if a file was actually removed.
    pub async fn remove(&self, key: &CacheKey) -> bool {
        let Some(path) = self.cache_path(key) else {
            return false;
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Removed image from disk cache");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to remove from disk cache");
                false
            }
        }
    }

    /// Removes every file in the cache directory.
    ///
    /// Files that cannot be deleted are logged and skipped. Returns the number
    /// of files removed.
    ///
    /// # Errors
    /// Returns `IoError` if the cache directory cannot be read.
    pub async fn clear(&self) -> CacheResult<usize> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to read cache dir: {e}")))?;

        let mut removed = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read cache dir entry");
                    break;
                }
            };
            let path = entry.path();
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache file"),
            }
        }

        debug!(removed = removed, "Cleared disk cache");
        Ok(removed)
    }

    /// Checks if an image is cached.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        match self.cache_path(key) {
            Some(path) => fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }
}

fn encode_jpeg(image: &image::DynamicImage) -> CacheResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    // JPEG has no alpha channel.
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| CacheError::WriteError(format!("Failed to encode image: {e}")))?;
    Ok(bytes)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| CacheError::WriteError(format!("Failed to create temp file: {e}")))?;

    file.write_all(bytes)
        .map_err(|e| CacheError::WriteError(format!("Failed to write cache file: {e}")))?;
    file.as_file()
        .sync_all()
        .map_err(|e| CacheError::WriteError(format!("Failed to flush cache file: {e}")))?;

    file.persist(path)
        .map_err(|e| CacheError::WriteError(format!("Failed to move cache file into place: {}", e.error)))?;
    Ok(())
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "asyncimageloader", "async-image-loader").map_or_else(
        || {
            std::env::temp_dir()
                .join("async-image-loader")
                .join("cache")
                .join("images")
        },
        |dirs| dirs.cache_dir().join("images"),
    )
}
