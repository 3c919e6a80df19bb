//! HTTP image fetcher: download, decode and downscale.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, trace};

use crate::domain::entities::ImageHandle;
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::ImageFetcher;

/// Default connect and read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the body buffer reserved up front from `Content-Length`.
const MAX_PREALLOCATION: usize = 8 * 1024 * 1024;

/// Maximum size a decoded image may have.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Maximum width in pixels.
    pub max_width: f32,
    /// Maximum height in pixels.
    pub max_height: f32,
}

impl BoundingBox {
    /// Creates a bounding box.
    #[must_use]
    pub const fn new(max_width: f32, max_height: f32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(320.0, 800.0)
    }
}

/// Computes the size an image must be scaled to so it fits inside `bounds`.
///
/// Returns `None` when the image already fits. Otherwise both axes are scaled
/// by `min(max_height / height, max_width / width)`, so the aspect ratio is
/// kept and neither dimension exceeds the box. Dimensions never drop below 1.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_within(width: u32, height: u32, bounds: BoundingBox) -> Option<(u32, u32)> {
    let (w, h) = (f64::from(width), f64::from(height));
    let (max_w, max_h) = (f64::from(bounds.max_width), f64::from(bounds.max_height));

    if w <= max_w && h <= max_h {
        return None;
    }

    let scale = (max_h / h).min(max_w / w);
    // The epsilon absorbs float error so exact fits (1000 * 0.32) land on 320.
    let scaled = |v: f64| ((v * scale + 1e-6).floor() as u32).max(1);
    Some((scaled(w), scaled(h)))
}

/// Downscales an image to fit inside `bounds`, returning it unchanged if it
/// already fits.
#[must_use]
pub fn downscale_to_fit(image: DynamicImage, bounds: BoundingBox) -> DynamicImage {
    match fit_within(image.width(), image.height(), bounds) {
        Some((width, height)) => {
            trace!(
                from_width = image.width(),
                from_height = image.height(),
                width = width,
                height = height,
                "Downscaling image"
            );
            image.resize_exact(width, height, FilterType::Triangle)
        }
        None => image,
    }
}

/// Decodes raw bytes and bounds the result.
///
/// # Errors
/// Returns `DecodeError` if the bytes are not a supported image.
pub fn decode_and_fit(bytes: &[u8], bounds: BoundingBox) -> CacheResult<DynamicImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| CacheError::DecodeError(format!("Failed to decode image: {e}")))?;
    Ok(downscale_to_fit(image, bounds))
}

/// Fetches images over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
    bounds: BoundingBox,
}

impl HttpImageFetcher {
    /// Creates a fetcher with the given bounding box and timeouts.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(
        bounds: BoundingBox,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> CacheResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| CacheError::NetworkError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            bounds,
        })
    }

    /// Creates a fetcher with default timeouts.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_bounds(bounds: BoundingBox) -> CacheResult<Self> {
        Self::new(bounds, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT)
    }

    /// Returns the bounding box applied to fetched images.
    #[must_use]
    pub const fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Downloads image bytes from a URL, reading the body chunk by chunk.
    async fn download(&self, url: &str) -> CacheResult<Bytes> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::NetworkError(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(CacheError::NetworkError(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let expected = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0)
            .min(MAX_PREALLOCATION);
        let mut body = BytesMut::with_capacity(expected);

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CacheError::NetworkError(format!("Failed to read body: {e}")))?
        {
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timed out: {e}")
    } else if e.is_connect() {
        format!("Connection failed: {e}")
    } else {
        format!("Request failed: {e}")
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> CacheResult<ImageHandle> {
        debug!(url = %url, "Downloading image from network");
        let bytes = self.download(url).await?;
        let size = bytes.len();
        let bounds = self.bounds;

        let image = tokio::task::spawn_blocking(move || decode_and_fit(&bytes, bounds))
            .await
            .map_err(|e| CacheError::DecodeError(format!("Decode task panicked: {e}")))??;

        debug!(
            url = %url,
            size = size,
            width = image.width(),
            height = image.height(),
            "Downloaded image"
        );
        Ok(ImageHandle::new(image))
    }
}
