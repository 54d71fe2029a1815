//! Canvas encoding and decoding

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::screenshot::ImageFormat;
use crate::{Error, Result};

/// Map a `0.0..=1.0` quality onto the JPEG encoder's `1..=100` scale
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode `pixels` as `format`.
///
/// PNG and WebP are lossless and ignore `quality`. JPEG has no alpha
/// channel, so transparency is dropped.
pub fn encode(pixels: &RgbaImage, format: ImageFormat, quality: f32) -> Result<Vec<u8>> {
    let (w, h) = pixels.dimensions();
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => PngEncoder::new(&mut buf)
            .write_image(pixels.as_raw(), w, h, ExtendedColorType::Rgba8)
            .map_err(|e| Error::EncodeError(format!("png: {}", e)))?,
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality))
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| Error::EncodeError(format!("jpeg: {}", e)))?
        }
        ImageFormat::Webp => WebPEncoder::new_lossless(&mut buf)
            .write_image(pixels.as_raw(), w, h, ExtendedColorType::Rgba8)
            .map_err(|e| Error::EncodeError(format!("webp: {}", e)))?,
    }
    Ok(buf)
}

/// Decode any supported image into RGBA pixels
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::DecodeError(e.to_string()))?;
    Ok(img.to_rgba8())
}
