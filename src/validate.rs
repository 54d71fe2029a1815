//! Validation of captures against the configured limits

use thiserror::Error;

use crate::config::ScreenshotConfig;
use crate::screenshot::{ScreenshotData, ValidatedScreenshot};

/// The first limit a capture violated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("screenshot size {size} bytes exceeds the maximum of {max_size} bytes")]
    TooLarge { size: u64, max_size: u64 },

    #[error("screenshot dimensions {width}x{height} exceed the maximum of {max_width}x{max_height}")]
    DimensionsExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("screenshot type {mime_type} is not allowed (allowed: {allowed})")]
    UnsupportedType { mime_type: String, allowed: String },
}

/// Check `data` against `config`: size, then dimensions, then MIME type.
///
/// Returns on the first violated limit. Passing captures become a
/// [`ValidatedScreenshot`] carrying a synthesized data URL.
pub fn validate(data: &ScreenshotData, config: &ScreenshotConfig) -> Result<ValidatedScreenshot, ValidationFailure> {
    if data.size > config.max_size {
        return Err(ValidationFailure::TooLarge {
            size: data.size,
            max_size: config.max_size,
        });
    }

    let max = config.max_dimensions;
    if data.width > max.width || data.height > max.height {
        return Err(ValidationFailure::DimensionsExceeded {
            width: data.width,
            height: data.height,
            max_width: max.width,
            max_height: max.height,
        });
    }

    let mime_type = data.mime_type();
    if !config.allows(mime_type) {
        return Err(ValidationFailure::UnsupportedType {
            mime_type: mime_type.to_string(),
            allowed: config
                .allowed_types
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    Ok(ValidatedScreenshot::from_checked(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Dimensions, ScreenshotConfigOverride};
    use crate::screenshot::ImageFormat;

    fn shot(format: ImageFormat, width: u32, height: u32, size: u64) -> ScreenshotData {
        ScreenshotData {
            data: "iVBORw0KGgo=".to_string(),
            format,
            width,
            height,
            size,
            captured_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_passing_capture_gets_data_url() {
        let data = shot(ImageFormat::Png, 1200, 800, 1000);
        let v = validate(&data, &ScreenshotConfig::default()).unwrap();
        assert_eq!(v.data_url, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(v.mime_type, "image/png");
        assert_eq!((v.width, v.height, v.size), (1200, 800, 1000));
    }

    #[test]
    fn test_size_limit_cites_actual_and_limit() {
        let err = validate(&shot(ImageFormat::Png, 10, 10, 1_048_577), &ScreenshotConfig::default()).unwrap_err();
        assert_eq!(err, ValidationFailure::TooLarge { size: 1_048_577, max_size: 1_048_576 });
        let msg = err.to_string();
        assert!(msg.contains("1048577"));
        assert!(msg.contains("1048576"));
    }

    #[test]
    fn test_size_at_limit_passes() {
        assert!(validate(&shot(ImageFormat::Png, 10, 10, 1_048_576), &ScreenshotConfig::default()).is_ok());
    }

    #[test]
    fn test_dimensions_checked_after_size() {
        let err = validate(&shot(ImageFormat::Png, 1201, 10, 5), &ScreenshotConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationFailure::DimensionsExceeded { width: 1201, .. }));
        assert!(err.to_string().contains("1201x10"));

        // both violated: size is reported first
        let err = validate(&shot(ImageFormat::Png, 5000, 5000, 2_000_000), &ScreenshotConfig::default()).unwrap_err();
        assert!(matches!(err, ValidationFailure::TooLarge { .. }));
    }

    #[test]
    fn test_mime_type_rejected_even_when_limits_pass() {
        let config = ScreenshotConfig::default().merged(&ScreenshotConfigOverride {
            allowed_types: Some(["image/png".to_string()].into_iter().collect()),
            max_dimensions: Some(Dimensions { width: 100, height: 100 }),
            ..Default::default()
        });
        let err = validate(&shot(ImageFormat::Jpeg, 50, 50, 10), &config).unwrap_err();
        assert_eq!(
            err,
            ValidationFailure::UnsupportedType {
                mime_type: "image/jpeg".into(),
                allowed: "image/png".into()
            }
        );
    }
}
