//! Rasterization of off-screen containers
//!
//! [`Rasterizer`] is the capability boundary between the capture pipeline and
//! whatever can actually draw markup. [`SoftwareRasterizer`] is the built-in
//! implementation: it lays the container out as stacked blocks, loads images
//! under a per-image watchdog, paints, and encodes. Browser-backed
//! implementations (see the `cdp` feature) plug in behind the same trait.

pub mod codec;
pub mod images;
pub mod layout;
pub mod paint;
pub mod raster;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, info};

use crate::config::CaptureOptions;
use crate::fit::fit_dimensions;
use crate::screenshot::ScreenshotData;
use crate::surface::Container;
use crate::{Error, Result};

use images::{ImageSource, LoadedImage, OfflineImageSource, IMAGE_LOAD_TIMEOUT};
use layout::{Block, ImageSlot};

/// Renders an attached container into an encoded image
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, container: &Container, options: &CaptureOptions) -> Result<ScreenshotData>;
}

#[async_trait]
impl<R: Rasterizer + ?Sized> Rasterizer for Arc<R> {
    async fn rasterize(&self, container: &Container, options: &CaptureOptions) -> Result<ScreenshotData> {
        (**self).rasterize(container, options).await
    }
}

#[async_trait]
impl<R: Rasterizer + ?Sized> Rasterizer for Box<R> {
    async fn rasterize(&self, container: &Container, options: &CaptureOptions) -> Result<ScreenshotData> {
        (**self).rasterize(container, options).await
    }
}

/// Pure-Rust rasterizer for email markup
pub struct SoftwareRasterizer {
    images: Arc<dyn ImageSource>,
    image_timeout: Duration,
}

impl Default for SoftwareRasterizer {
    fn default() -> Self {
        Self::offline()
    }
}

impl SoftwareRasterizer {
    pub fn new(images: Arc<dyn ImageSource>) -> Self {
        Self {
            images,
            image_timeout: IMAGE_LOAD_TIMEOUT,
        }
    }

    /// A rasterizer that never touches the network; external images render
    /// as placeholders.
    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineImageSource))
    }

    /// A rasterizer fetching external images over HTTP(S)
    #[cfg(feature = "fetch")]
    pub fn with_http(origin: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Arc::new(images::HttpImageSource::new(origin)?)))
    }

    /// Override the per-image watchdog
    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    /// Lay out, load images and paint `container` into raw canvas pixels
    pub async fn render_pixels(&self, container: &Container, options: &CaptureOptions) -> Result<RgbaImage> {
        let blocks = layout::collect_blocks(&container.content);
        let srcs: Vec<Option<&str>> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Image(img) => Some(img.src.as_deref()),
                _ => None,
            })
            .collect();

        let loaded = images::load_all(self.images.as_ref(), &srcs, self.image_timeout).await;

        let mut pixels = Vec::new();
        let mut slots = Vec::with_capacity(loaded.len());
        let mut tainted_by = None;
        for (src, image) in srcs.iter().zip(loaded) {
            match image {
                LoadedImage::Ready { pixels: p, cross_origin } => {
                    if cross_origin && tainted_by.is_none() {
                        tainted_by = src.map(str::to_string);
                    }
                    slots.push(ImageSlot::Loaded {
                        index: pixels.len(),
                        width: p.width(),
                        height: p.height(),
                    });
                    pixels.push(p);
                }
                LoadedImage::Failed(_) => slots.push(ImageSlot::Placeholder),
            }
        }

        let style = &container.style;
        let pad = style.padding as i32;
        let (nodes, content_height) = layout::layout_blocks(&blocks, &slots, pad, pad, style.width)?;
        let width = style.outer_width();
        let height = content_height
            .checked_add(style.padding * 2)
            .ok_or_else(|| Error::RenderError("content is too tall to render".into()))?;
        debug!(
            "Laid out {} blocks into a {}x{} box ({} images loaded)",
            nodes.len(),
            width,
            height,
            pixels.len()
        );

        let commands = paint::paint_layout(&nodes, width, height, options.background_color);
        let canvas = raster::rasterize_commands(width, height, options.scale, &commands, &pixels)?;

        // pixels drawn from a cross-origin image without CORS approval cannot be read back
        if let Some(url) = tainted_by {
            return Err(Error::RenderError(format!(
                "Tainted canvases may not be exported: cross-origin image {} was drawn without CORS approval",
                url
            )));
        }
        Ok(canvas)
    }
}

/// Downscale `canvas` into the option bounds when auto-resize is on
pub(crate) fn fit_canvas(canvas: RgbaImage, options: &CaptureOptions) -> RgbaImage {
    let (w, h) = canvas.dimensions();
    if !options.auto_resize || (w <= options.max_width && h <= options.max_height) {
        return canvas;
    }
    let (nw, nh) = fit_dimensions(w, h, options.max_width, options.max_height);
    debug!("Auto-resizing canvas {}x{} -> {}x{}", w, h, nw, nh);
    imageops::resize(&canvas, nw, nh, FilterType::Lanczos3)
}

#[async_trait]
impl Rasterizer for SoftwareRasterizer {
    async fn rasterize(&self, container: &Container, options: &CaptureOptions) -> Result<ScreenshotData> {
        options.check()?;
        let canvas = fit_canvas(self.render_pixels(container, options).await?, options);
        let (width, height) = canvas.dimensions();
        let bytes = codec::encode(&canvas, options.format, options.quality)?;
        let shot = ScreenshotData::from_encoded(&bytes, options.format, width, height);
        info!(
            "Rasterized container to {}x{} {} (~{} bytes)",
            width,
            height,
            shot.mime_type(),
            shot.size
        );
        Ok(shot)
    }
}
