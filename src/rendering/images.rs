//! Image loading for the software rasterizer
//!
//! Every image is loaded under its own watchdog. A load that times out,
//! fails, or yields undecodable bytes resolves to [`LoadedImage::Failed`] and
//! the rasterizer draws a placeholder in its place, so one broken image can
//! neither hang nor blank a capture.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as Base64Engine;
use image::RgbaImage;
use log::{debug, warn};

use crate::rendering::codec;
use crate::rewrite::is_external_src;
use crate::{Error, Result};

/// Per-image load watchdog
pub const IMAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Response to an anonymous image request
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Whether the response carried CORS approval for our origin
    pub cors_approved: bool,
}

/// Where external image bytes come from
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch `url` without credentials
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// Image source that refuses every request
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineImageSource;

#[async_trait]
impl ImageSource for OfflineImageSource {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        Err(Error::NetworkError(format!("network access disabled, cannot load {}", url)))
    }
}

/// Fetches images over HTTP(S) the way a page would for `<img crossorigin="anonymous">`
#[cfg(feature = "fetch")]
pub struct HttpImageSource {
    client: reqwest::Client,
    origin: String,
}

#[cfg(feature = "fetch")]
impl HttpImageSource {
    /// Origin announced to image hosts when none is configured
    pub const DEFAULT_ORIGIN: &'static str = "http://localhost";

    pub fn new(origin: impl Into<String>) -> Result<Self> {
        // the watchdog enforces the deadline; this only bounds stuck sockets
        let client = reqwest::Client::builder()
            .timeout(IMAGE_LOAD_TIMEOUT * 2)
            .build()
            .map_err(|e| Error::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            origin: origin.into(),
        })
    }
}

#[cfg(feature = "fetch")]
#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let parsed = url::Url::parse(url).map_err(|e| Error::NetworkError(format!("invalid image URL {}: {}", url, e)))?;
        let resp = self
            .client
            .get(parsed)
            .header(reqwest::header::ORIGIN, self.origin.as_str())
            .send()
            .await
            .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

        let cors_approved = resp
            .headers()
            .get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                let v = v.trim();
                v == "*" || v.eq_ignore_ascii_case(&self.origin)
            })
            .unwrap_or(false);

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::NetworkError(format!("Failed to read image body from {}: {}", url, e)))?;

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            cors_approved,
        })
    }
}

/// Outcome of loading one `<img>`
#[derive(Debug, Clone)]
pub enum LoadedImage {
    Ready {
        pixels: RgbaImage,
        /// Drawing this image taints the canvas
        cross_origin: bool,
    },
    Failed(String),
}

/// Decode a `data:` URL image
fn decode_data_url(src: &str) -> Result<RgbaImage> {
    let rest = &src[5..];
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::DecodeError("malformed data URL".into()))?;
    if !meta.ends_with(";base64") {
        return Err(Error::DecodeError("only base64 data URLs carry images".into()));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::DecodeError(format!("invalid base64 image: {}", e)))?;
    codec::decode(&bytes)
}

/// Load one image, giving up after `timeout`
pub async fn load_image(source: &dyn ImageSource, src: Option<&str>, timeout: Duration) -> LoadedImage {
    let src = match src {
        Some(s) if !s.is_empty() => s,
        _ => return LoadedImage::Failed("image has no source".into()),
    };

    if src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        return match decode_data_url(src) {
            Ok(pixels) => LoadedImage::Ready {
                pixels,
                cross_origin: false,
            },
            Err(e) => LoadedImage::Failed(e.to_string()),
        };
    }

    if !is_external_src(src) {
        return LoadedImage::Failed(format!("cannot resolve relative image source {}", src));
    }

    debug!("Loading image {}", src);
    let fetched = match tokio::time::timeout(timeout, source.fetch(src)).await {
        Ok(Ok(f)) => f,
        Ok(Err(e)) => return LoadedImage::Failed(e.to_string()),
        Err(_) => {
            return LoadedImage::Failed(Error::Timeout(timeout.as_millis() as u64).to_string());
        }
    };

    match codec::decode(&fetched.bytes) {
        Ok(pixels) => LoadedImage::Ready {
            pixels,
            cross_origin: !fetched.cors_approved,
        },
        Err(e) => LoadedImage::Failed(e.to_string()),
    }
}

/// Load every source concurrently; failures are logged and reported as such
pub async fn load_all(source: &dyn ImageSource, srcs: &[Option<&str>], timeout: Duration) -> Vec<LoadedImage> {
    let loads = srcs.iter().map(|src| load_image(source, *src, timeout));
    let results = futures::future::join_all(loads).await;
    for (src, result) in srcs.iter().zip(&results) {
        if let LoadedImage::Failed(reason) = result {
            warn!(
                "Image {} could not be rendered, using placeholder: {}",
                src.unwrap_or("<none>"),
                reason
            );
        }
    }
    results
}
