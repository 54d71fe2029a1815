//! Capture results and their storage-ready form

use std::fmt;
use std::str::FromStr;

use base64::Engine as Base64Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Output encodings a capture can be produced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }

    /// Whether the encoder honors a quality setting
    pub fn is_lossy(self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }

    pub(crate) fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    /// Accepts either a short name (`png`, `jpg`, `jpeg`, `webp`) or a MIME type.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("image/").unwrap_or(&lower);
        match name {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            _ => Err(Error::ConfigError(format!("unsupported image format: {}", s))),
        }
    }
}

impl TryFrom<String> for ImageFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImageFormat> for String {
    fn from(f: ImageFormat) -> Self {
        f.name().to_string()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Approximate decoded size of a base64 payload: `ceil(len * 3 / 4)`.
///
/// Padding makes this overestimate by up to two bytes.
pub fn estimated_size(encoded_len: usize) -> u64 {
    (encoded_len as u64 * 3).div_ceil(4)
}

/// An in-memory capture result
///
/// `width`/`height` are the dimensions of the rasterized canvas, not of the
/// element that was rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotData {
    /// Base64 payload (no `data:` prefix)
    pub data: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Estimated decoded byte size, see [`estimated_size`]
    pub size: u64,
    pub captured_at: DateTime<Utc>,
}

impl ScreenshotData {
    /// Wrap freshly encoded image bytes
    pub fn from_encoded(bytes: &[u8], format: ImageFormat, width: u32, height: u32) -> Self {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        let size = estimated_size(data.len());
        Self {
            data,
            format,
            width,
            height,
            size,
            captured_at: Utc::now(),
        }
    }

    /// Build from a `data:<mime>;base64,<payload>` URL, reading the
    /// dimensions from the image header.
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| Error::DecodeError("not a data URL".into()))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| Error::DecodeError("data URL is not base64 encoded".into()))?;
        let format: ImageFormat = mime.parse()?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| Error::DecodeError(format!("invalid base64 payload: {}", e)))?;
        let (width, height) = image_dimensions(&bytes)?;
        Ok(Self {
            data: payload.to_string(),
            format,
            width,
            height,
            size: estimated_size(payload.len()),
            captured_at: Utc::now(),
        })
    }

    /// Build from raw image file bytes, sniffing the format
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self> {
        let guessed = image::guess_format(bytes)
            .map_err(|e| Error::DecodeError(format!("unrecognized image: {}", e)))?;
        let format = ImageFormat::from_image_format(guessed)
            .ok_or_else(|| Error::DecodeError(format!("unsupported image type: {:?}", guessed)))?;
        let (width, height) = image_dimensions(bytes)?;
        Ok(Self::from_encoded(bytes, format, width, height))
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Decode the base64 payload back into encoded image bytes
    pub fn decoded_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| Error::DecodeError(format!("invalid base64 payload: {}", e)))
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.data)
    }
}

fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::DecodeError(e.to_string()))?;
    Ok(reader.into_dimensions()?)
}

/// The storage-ready form of a capture that passed every check
///
/// Only [`validate`](crate::validate::validate) constructs this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedScreenshot {
    pub data_url: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

impl ValidatedScreenshot {
    pub(crate) fn from_checked(data: &ScreenshotData) -> Self {
        Self {
            data_url: data.data_url(),
            mime_type: data.mime_type().to_string(),
            width: data.width,
            height: data.height,
            size: data.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_estimated_size_matches_formula() {
        assert_eq!(estimated_size(0), 0);
        assert_eq!(estimated_size(4), 3);
        assert_eq!(estimated_size(5), 4);
        assert_eq!(estimated_size(8), 6);
        assert_eq!(estimated_size(1_000_001), 750_001);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("image/png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert!("image/gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_from_image_bytes_reads_header() {
        let shot = ScreenshotData::from_image_bytes(&tiny_png()).unwrap();
        assert_eq!(shot.format, ImageFormat::Png);
        assert_eq!((shot.width, shot.height), (3, 2));
        assert_eq!(shot.size, estimated_size(shot.data.len()));
        assert_eq!(shot.decoded_bytes().unwrap(), tiny_png());
    }

    #[test]
    fn test_data_url_prefix() {
        let shot = ScreenshotData::from_image_bytes(&tiny_png()).unwrap();
        let url = shot.data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        let parsed = ScreenshotData::from_data_url(&url).unwrap();
        assert_eq!(parsed.data, shot.data);
        assert_eq!((parsed.width, parsed.height), (3, 2));
    }

    #[test]
    fn test_from_data_url_rejects_garbage() {
        assert!(ScreenshotData::from_data_url("https://example.com/x.png").is_err());
        assert!(ScreenshotData::from_data_url("data:image/png,plain").is_err());
        assert!(ScreenshotData::from_data_url("data:image/gif;base64,AAAA").is_err());
    }
}
