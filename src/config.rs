//! Capture and validation configuration
//!
//! Both configuration sets follow the same pattern: a complete struct with
//! conservative defaults, and an "overrides" struct whose every field is
//! optional. Overrides are applied with a shallow, field-by-field merge; no
//! field is nested deeper than a flat pair, so no deep merge is needed.
//!
//! # Examples
//!
//! ```
//! use mailpreview::config::{CaptureOptions, CaptureOverrides};
//! use mailpreview::ImageFormat;
//!
//! let opts = CaptureOptions::default().merged(&CaptureOverrides {
//!     format: Some(ImageFormat::Jpeg),
//!     ..Default::default()
//! });
//! assert_eq!(opts.format, ImageFormat::Jpeg);
//! assert_eq!(opts.max_width, 1200);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::screenshot::ImageFormat;
use crate::{Error, Result};

/// Default maximum encoded size of a preview (1 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 1_048_576;
/// Default lossy quality for JPEG output and recompression
pub const DEFAULT_QUALITY: f32 = 0.92;
/// Default bounds tuned for email previews
pub const DEFAULT_MAX_WIDTH: u32 = 1200;
pub const DEFAULT_MAX_HEIGHT: u32 = 1600;
/// Default device pixel ratio for captures
pub const DEFAULT_SCALE: f32 = 2.0;

/// Pixel bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: DEFAULT_MAX_WIDTH,
            height: DEFAULT_MAX_HEIGHT,
        }
    }
}

/// Limits a capture must satisfy before it can be stored as a template preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotConfig {
    /// Maximum (approximate) decoded byte size
    pub max_size: u64,
    /// MIME types accepted by the validator
    pub allowed_types: BTreeSet<String>,
    /// Maximum pixel dimensions; exceeding them triggers an optimizer resize
    pub max_dimensions: Dimensions,
    /// Lossy re-encode quality in `0.0..=1.0`
    pub compression_quality: f32,
    /// Whether the optimizer runs before validation
    pub auto_resize: bool,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            allowed_types: [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Webp]
                .iter()
                .map(|f| f.mime_type().to_string())
                .collect(),
            max_dimensions: Dimensions::default(),
            compression_quality: DEFAULT_QUALITY,
            auto_resize: true,
        }
    }
}

/// Caller-supplied partial [`ScreenshotConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenshotConfigOverride {
    pub max_size: Option<u64>,
    pub allowed_types: Option<BTreeSet<String>>,
    pub max_dimensions: Option<Dimensions>,
    pub compression_quality: Option<f32>,
    pub auto_resize: Option<bool>,
}

impl ScreenshotConfig {
    /// Shallow-merge `overrides` over `self`
    pub fn merged(&self, overrides: &ScreenshotConfigOverride) -> Self {
        Self {
            max_size: overrides.max_size.unwrap_or(self.max_size),
            allowed_types: overrides
                .allowed_types
                .clone()
                .unwrap_or_else(|| self.allowed_types.clone()),
            max_dimensions: overrides.max_dimensions.unwrap_or(self.max_dimensions),
            compression_quality: overrides
                .compression_quality
                .unwrap_or(self.compression_quality),
            auto_resize: overrides.auto_resize.unwrap_or(self.auto_resize),
        }
    }

    /// Reject configurations no capture could ever satisfy
    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.compression_quality) {
            return Err(Error::ConfigError(format!(
                "compressionQuality must be within 0..=1, got {}",
                self.compression_quality
            )));
        }
        if self.max_dimensions.width == 0 || self.max_dimensions.height == 0 {
            return Err(Error::ConfigError("maxDimensions must be non-zero".into()));
        }
        if self.allowed_types.is_empty() {
            return Err(Error::ConfigError("allowedTypes must not be empty".into()));
        }
        Ok(())
    }

    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_types.contains(mime_type)
    }
}

/// Options handed to a [`Rasterizer`](crate::rendering::Rasterizer) for one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Output encoding
    pub format: ImageFormat,
    /// Lossy quality for JPEG (ignored by lossless formats)
    pub quality: f32,
    /// Device pixel ratio applied to the container box
    pub scale: f32,
    /// Canvas width bound used by auto-resize
    pub max_width: u32,
    /// Canvas height bound used by auto-resize
    pub max_height: u32,
    /// Fill behind the rendered content
    pub background_color: Color,
    /// Downscale canvases exceeding the bounds before encoding
    pub auto_resize: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: DEFAULT_QUALITY,
            scale: DEFAULT_SCALE,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            background_color: Color::WHITE,
            auto_resize: true,
        }
    }
}

/// Caller-supplied partial [`CaptureOptions`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureOverrides {
    pub format: Option<ImageFormat>,
    pub quality: Option<f32>,
    pub scale: Option<f32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub background_color: Option<Color>,
    pub auto_resize: Option<bool>,
}

impl CaptureOptions {
    /// Shallow-merge `overrides` over `self`
    pub fn merged(&self, overrides: &CaptureOverrides) -> Self {
        Self {
            format: overrides.format.unwrap_or(self.format),
            quality: overrides.quality.unwrap_or(self.quality),
            scale: overrides.scale.unwrap_or(self.scale),
            max_width: overrides.max_width.unwrap_or(self.max_width),
            max_height: overrides.max_height.unwrap_or(self.max_height),
            background_color: overrides.background_color.unwrap_or(self.background_color),
            auto_resize: overrides.auto_resize.unwrap_or(self.auto_resize),
        }
    }

    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(Error::ConfigError(format!(
                "quality must be within 0..=1, got {}",
                self.quality
            )));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::ConfigError(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(Error::ConfigError("maxWidth/maxHeight must be non-zero".into()));
        }
        Ok(())
    }
}

/// An RGBA color parsed from the CSS forms used in templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "white" => return Ok(Color::WHITE),
            "black" => return Ok(Color::BLACK),
            "transparent" => return Ok(Color::TRANSPARENT),
            _ => {}
        }

        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| Error::ConfigError(format!("unsupported color: {}", s)))?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::ConfigError(format!("invalid hex color: {}", s)));
        }
        let channel = |i: usize, len: usize| -> u8 {
            let v = u8::from_str_radix(&hex[i * len..(i + 1) * len], 16).unwrap_or(0);
            // #rgb shorthand doubles each nibble
            if len == 1 {
                v * 17
            } else {
                v
            }
        };
        match hex.len() {
            3 => Ok(Color::rgb(channel(0, 1), channel(1, 1), channel(2, 1))),
            6 => Ok(Color::rgb(channel(0, 2), channel(1, 2), channel(2, 2))),
            8 => Ok(Color {
                r: channel(0, 2),
                g: channel(1, 2),
                b: channel(2, 2),
                a: channel(3, 2),
            }),
            _ => Err(Error::ConfigError(format!("invalid hex color: {}", s))),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}
