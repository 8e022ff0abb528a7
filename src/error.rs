//! Error taxonomy for the studio.
//!
//! Three failure classes matter to callers and they must stay
//! distinguishable:
//!
//! - [`Error::ImageLoad`] — a source could not be fetched or decoded.
//! - [`Error::PixelAccessDenied`] — the image exists (and may even be
//!   displayable by the host), but its pixel data cannot be read back,
//!   so none of the pixel-level algorithms can run. UIs should disable
//!   pixel-editing affordances on this error rather than retry.
//! - [`Error::ExportFailure`] — final compositing or serialization failed.
//!   No partial output is ever produced.

use thiserror::Error;

/// Errors produced by the compositing and segmentation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The image source could not be fetched or decoded.
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    /// The image loaded but its pixels cannot be read back.
    #[error("pixel data is not readable: {0}")]
    PixelAccessDenied(String),

    /// Final compositing or raster serialization failed.
    #[error("export failed: {0}")]
    ExportFailure(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageLoad(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ImageLoad(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
