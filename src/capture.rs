//! Capture orchestration: HTML string in, screenshot out
//!
//! [`Capturer::capture_html`] hides the off-screen container lifecycle and
//! cross-origin failure recovery from callers:
//!
//! 1. attach an off-screen 600px container holding the raw markup,
//! 2. rasterize it,
//! 3. on failure, swap in the CORS-safe rewrite and rasterize once more,
//! 4. detach the container on every exit path.

use log::{debug, info, warn};

use crate::config::{CaptureOptions, CaptureOverrides};
use crate::rendering::Rasterizer;
use crate::rewrite::cors_safe_html;
use crate::screenshot::ScreenshotData;
use crate::surface::{AttachedContainer, Container, ContainerStyle, Document};
use crate::{Error, Result};

/// Drives a [`Rasterizer`] over off-screen containers of a [`Document`]
pub struct Capturer<R> {
    rasterizer: R,
    document: Document,
    defaults: CaptureOptions,
}

impl<R: Rasterizer> Capturer<R> {
    pub fn new(rasterizer: R) -> Self {
        Self::with_document(rasterizer, Document::new())
    }

    /// Capture into containers attached to `document`
    pub fn with_document(rasterizer: R, document: Document) -> Self {
        Self {
            rasterizer,
            document,
            defaults: CaptureOptions::default(),
        }
    }

    /// Replace the options overrides are merged onto
    pub fn with_defaults(mut self, defaults: CaptureOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Capture `html` as rendered in a standard email-width container.
    ///
    /// Fails with [`Error::CaptureFailed`] only when both the original markup
    /// and its CORS-safe rewrite fail to rasterize. Configuration errors are
    /// returned before anything is attached.
    pub async fn capture_html(&self, html: &str, overrides: &CaptureOverrides) -> Result<ScreenshotData> {
        let options = self.defaults.merged(overrides);
        options.check()?;

        let container = self.document.attach(Container::new(
            ContainerStyle::email(options.background_color),
            html,
        ));

        let result = self.capture_attached(&container, html, &options).await;
        // dropping the guard would detach as well; detach eagerly so the
        // document is clean before the caller observes the result
        container.detach();
        result
    }

    async fn capture_attached(
        &self,
        container: &AttachedContainer,
        html: &str,
        options: &CaptureOptions,
    ) -> Result<ScreenshotData> {
        let original = match self.rasterize(container, options).await {
            Ok(shot) => {
                info!("Captured preview {}x{}", shot.width, shot.height);
                return Ok(shot);
            }
            Err(e) => e,
        };

        warn!("Capture failed, retrying with CORS-safe content: {}", original);
        container.set_content(cors_safe_html(html));

        match self.rasterize(container, options).await {
            Ok(shot) => {
                info!("Captured CORS-safe preview {}x{}", shot.width, shot.height);
                Ok(shot)
            }
            Err(fallback) => {
                warn!("CORS-safe capture failed as well: {}", fallback);
                Err(Error::CaptureFailed {
                    original: original.to_string(),
                    fallback: fallback.to_string(),
                })
            }
        }
    }

    async fn rasterize(&self, container: &AttachedContainer, options: &CaptureOptions) -> Result<ScreenshotData> {
        let snapshot = container
            .snapshot()
            .ok_or_else(|| Error::RenderError("container is no longer attached".into()))?;
        debug!("Rasterizing {} bytes of markup", snapshot.content.len());
        self.rasterizer.rasterize(&snapshot, options).await
    }
}
