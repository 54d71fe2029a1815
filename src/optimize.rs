//! Best-effort shrinking of captures before validation
//!
//! The optimizer guarantees the dimension bound and tries for the size
//! bound. It is advisory: the validator has the final word, and a capture the
//! optimizer could not shrink enough is simply rejected there.

use std::fmt;

use image::imageops::{self, FilterType};
use log::{debug, info, warn};

use crate::config::ScreenshotConfig;
use crate::fit::fit_dimensions;
use crate::rendering::codec;
use crate::screenshot::{ImageFormat, ScreenshotData};
use crate::Result;

/// A non-fatal problem hit while recompressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationWarning {
    pub message: String,
}

impl fmt::Display for OptimizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recompression failed, keeping unoptimized image: {}", self.message)
    }
}

/// Result of [`optimize_with_report`]
#[derive(Debug, Clone)]
pub struct Optimized {
    pub data: ScreenshotData,
    pub resized: bool,
    pub recompressed: bool,
    pub warning: Option<OptimizationWarning>,
}

/// Shrink `data` toward the limits of `config`.
///
/// The returned capture always fits `config.max_dimensions`. Its size fits
/// `config.max_size` when lossy recompression manages it; recompression
/// failures are logged and swallowed.
pub fn optimize(data: ScreenshotData, config: &ScreenshotConfig) -> Result<ScreenshotData> {
    optimize_with_report(data, config).map(|o| o.data)
}

/// [`optimize`], also reporting which steps ran
pub fn optimize_with_report(data: ScreenshotData, config: &ScreenshotConfig) -> Result<Optimized> {
    let max = config.max_dimensions;
    let needs_resize = data.width > max.width || data.height > max.height;
    if !needs_resize && data.size <= config.max_size {
        return Ok(Optimized {
            data,
            resized: false,
            recompressed: false,
            warning: None,
        });
    }

    let mut pixels = codec::decode(&data.decoded_bytes()?)?;
    let mut current = data;
    let mut resized = false;

    if needs_resize {
        let (w, h) = fit_dimensions(pixels.width(), pixels.height(), max.width, max.height);
        info!("Resizing capture {}x{} -> {}x{}", pixels.width(), pixels.height(), w, h);
        pixels = imageops::resize(&pixels, w, h, FilterType::Lanczos3);
        let bytes = codec::encode(&pixels, current.format, config.compression_quality)?;
        current = ScreenshotData::from_encoded(&bytes, current.format, w, h);
        resized = true;
    }

    if current.size <= config.max_size {
        return Ok(Optimized {
            data: current,
            resized,
            recompressed: false,
            warning: None,
        });
    }

    debug!(
        "Capture still {} bytes (limit {}), recompressing at quality {}",
        current.size, config.max_size, config.compression_quality
    );
    match codec::encode(&pixels, ImageFormat::Jpeg, config.compression_quality) {
        Ok(bytes) => {
            let candidate = ScreenshotData::from_encoded(&bytes, ImageFormat::Jpeg, pixels.width(), pixels.height());
            if candidate.size < current.size {
                info!("Recompressed capture {} -> {} bytes", current.size, candidate.size);
                Ok(Optimized {
                    data: candidate,
                    resized,
                    recompressed: true,
                    warning: None,
                })
            } else {
                debug!("Recompression did not shrink the capture, keeping original encoding");
                Ok(Optimized {
                    data: current,
                    resized,
                    recompressed: false,
                    warning: None,
                })
            }
        }
        Err(e) => {
            let warning = OptimizationWarning { message: e.to_string() };
            warn!("{}", warning);
            Ok(Optimized {
                data: current,
                resized,
                recompressed: false,
                warning: Some(warning),
            })
        }
    }
}
