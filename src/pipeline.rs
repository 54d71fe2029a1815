//! HTML to storage-ready preview: capture, optimize, validate

use log::{debug, info};

use crate::capture::Capturer;
use crate::config::{CaptureOverrides, ScreenshotConfig};
use crate::optimize::optimize;
use crate::rendering::Rasterizer;
use crate::screenshot::{ScreenshotData, ValidatedScreenshot};
use crate::surface::Document;
use crate::validate::validate;
use crate::Result;

/// The full preview pipeline over a [`Rasterizer`]
pub struct ScreenshotPipeline<R> {
    capturer: Capturer<R>,
    config: ScreenshotConfig,
}

impl<R: Rasterizer> ScreenshotPipeline<R> {
    /// Pipeline with the default validation limits
    pub fn new(rasterizer: R) -> Self {
        Self::with_config(rasterizer, ScreenshotConfig::default())
    }

    pub fn with_config(rasterizer: R, config: ScreenshotConfig) -> Self {
        Self {
            capturer: Capturer::new(rasterizer),
            config,
        }
    }

    /// Capture into containers attached to `document`
    pub fn with_document(rasterizer: R, config: ScreenshotConfig, document: Document) -> Self {
        Self {
            capturer: Capturer::with_document(rasterizer, document),
            config,
        }
    }

    pub fn config(&self) -> &ScreenshotConfig {
        &self.config
    }

    pub fn capturer(&self) -> &Capturer<R> {
        &self.capturer
    }

    /// Optimize (when enabled or needed) and validate an existing capture
    pub fn finish(&self, shot: ScreenshotData) -> Result<ValidatedScreenshot> {
        let max = self.config.max_dimensions;
        let over_limits =
            shot.size > self.config.max_size || shot.width > max.width || shot.height > max.height;
        let shot = if self.config.auto_resize || over_limits {
            optimize(shot, &self.config)?
        } else {
            shot
        };
        debug!("Validating {}x{} {} (~{} bytes)", shot.width, shot.height, shot.mime_type(), shot.size);
        Ok(validate(&shot, &self.config)?)
    }

    /// Capture `html` and turn it into a validated preview.
    ///
    /// Capture-time failures surface as [`Error::CaptureFailed`](crate::Error::CaptureFailed)
    /// (or the underlying render/config error); limit violations as
    /// [`Error::Validation`](crate::Error::Validation).
    pub async fn capture_validated(&self, html: &str, overrides: &CaptureOverrides) -> Result<ValidatedScreenshot> {
        self.config.check()?;
        let shot = self.capturer.capture_html(html, overrides).await?;
        let validated = self.finish(shot)?;
        info!(
            "Preview ready: {}x{} {} ({} bytes)",
            validated.width, validated.height, validated.mime_type, validated.size
        );
        Ok(validated)
    }
}
