//! Mailpreview
//!
//! Turns newsletter/email HTML into a bounded preview image suitable for
//! storing next to a template.
//!
//! # Pipeline
//!
//! 1. **Capture**: the HTML is placed in an off-screen, email-width container
//!    and rasterized by a [`Rasterizer`]. A failed attempt is retried once
//!    with external images swapped for placeholders ([`cors_safe_html`]).
//! 2. **Optimize**: captures over the configured bounds are resized and, if
//!    still too heavy, recompressed ([`optimize()`]).
//! 3. **Validate**: size, dimensions and MIME type are checked against
//!    [`ScreenshotConfig`] ([`validate()`]).
//!
//! # Backends
//!
//! - [`SoftwareRasterizer`] (always available): block layout and raster in
//!   pure Rust, image fetching over HTTP with the `fetch` feature (default)
//! - `cdp::CdpRasterizer` (feature `cdp`): headless Chrome
//!
//! # Example
//!
//! ```
//! use mailpreview::{CaptureOverrides, ScreenshotPipeline, SoftwareRasterizer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> mailpreview::Result<()> {
//! let pipeline = ScreenshotPipeline::new(SoftwareRasterizer::offline());
//! let preview = pipeline
//!     .capture_validated("<h1>Hello</h1><p>Welcome aboard.</p>", &CaptureOverrides::default())
//!     .await?;
//! assert!(preview.data_url.starts_with("data:image/png;base64,"));
//! assert!(preview.width <= 1200 && preview.height <= 1600);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod autosave;
pub mod capture;
pub mod config;
pub mod fit;
pub mod optimize;
pub mod pipeline;
pub mod rendering;
pub mod rewrite;
pub mod screenshot;
pub mod surface;
pub mod templates;
pub mod validate;

// Chrome-backed rasterizer, requires a local Chrome/Chromium
#[cfg(feature = "cdp")]
pub mod cdp;

pub use capture::Capturer;
pub use config::{CaptureOptions, CaptureOverrides, Color, Dimensions, ScreenshotConfig, ScreenshotConfigOverride};
pub use fit::fit_dimensions;
pub use optimize::optimize;
pub use pipeline::ScreenshotPipeline;
pub use rendering::{Rasterizer, SoftwareRasterizer};
pub use rewrite::cors_safe_html;
pub use screenshot::{ImageFormat, ScreenshotData, ValidatedScreenshot};
pub use validate::{validate, ValidationFailure};

/// Rasterizer used when the caller does not pick one.
///
/// Fetches remote images over HTTP when the `fetch` feature is enabled and
/// renders every external image as a placeholder otherwise.
pub fn default_rasterizer() -> Result<SoftwareRasterizer> {
    #[cfg(feature = "fetch")]
    {
        SoftwareRasterizer::with_http(rendering::images::HttpImageSource::DEFAULT_ORIGIN)
    }
    #[cfg(not(feature = "fetch"))]
    {
        Ok(SoftwareRasterizer::offline())
    }
}

/// Capture, optimize and validate `html` with the default rasterizer and limits
pub async fn capture_preview(html: &str, overrides: &CaptureOverrides) -> Result<ValidatedScreenshot> {
    let pipeline = ScreenshotPipeline::new(default_rasterizer()?);
    pipeline.capture_validated(html, overrides).await
}
