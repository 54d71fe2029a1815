//! Error types for the preview pipeline

use thiserror::Error;

use crate::validate::ValidationFailure;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, optimizing or validating a preview
#[derive(Error, Debug)]
pub enum Error {
    /// Rasterization could not produce an image
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Both the original capture and the CORS-safe retry failed
    #[error("Screenshot capture failed: {original}; CORS-safe retry also failed: {fallback}")]
    CaptureFailed { original: String, fallback: String },

    /// The produced image exceeds a configured limit
    #[error("Screenshot validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Failed to encode a canvas
    #[error("Image encoding failed: {0}")]
    EncodeError(String),

    /// Failed to decode an encoded payload or a fetched image
    #[error("Image decoding failed: {0}")]
    DecodeError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The template collaborator rejected a save
    #[error("Template storage failed: {0}")]
    StorageError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures raised while producing the image (as opposed to
    /// rejecting an image that was produced).
    pub fn is_capture_failure(&self) -> bool {
        !matches!(self, Error::Validation(_) | Error::ConfigError(_) | Error::StorageError(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => Error::DecodeError(e.to_string()),
            image::ImageError::Encoding(e) => Error::EncodeError(e.to_string()),
            other => Error::Other(other.to_string()),
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
