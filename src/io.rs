//! Image loading and raster serialization.
//!
//! Sources come in as paths, raw bytes, `data:` URLs, or remote URLs.
//! Remote fetching needs the `fetch` feature:
//!
//! ```toml
//! [dependencies]
//! merch-studio = { version = "0.1", features = ["fetch"] }
//! ```
//!
//! Without it, a [`ImageSource::Url`] still names a perfectly displayable
//! image for a host UI, but this build cannot read its pixels back, so
//! loading fails with [`Error::PixelAccessDenied`] — distinct from a fetch
//! or decode failure, which is [`Error::ImageLoad`].

use std::io::Cursor;
use std::path::PathBuf;

use base64::Engine;
use image::ImageFormat;
use tracing::debug;

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};

// ============================================================================
// ImageSource
// ============================================================================

/// A reference to an image the engine can decode.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// Already-fetched encoded bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// An RFC 2397 `data:` URL with base64 payload.
    DataUrl(String),
    /// A remote `http(s)` URL. Requires the `fetch` feature to load.
    Url(String),
}

impl ImageSource {
    /// Classifies a string reference: `data:` URLs, `http(s)` URLs, and
    /// everything else as a filesystem path.
    pub fn from_str_ref(reference: &str) -> Self {
        if reference.starts_with("data:") {
            Self::DataUrl(reference.to_string())
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Url(reference.to_string())
        } else {
            Self::Path(PathBuf::from(reference))
        }
    }

    /// A short human-readable description, used in error messages and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Bytes(b) => format!("{} inline bytes", b.len()),
            Self::DataUrl(_) => "data URL".to_string(),
            Self::Url(u) => u.clone(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Loads and decodes a source into a [`Bitmap`].
pub fn load_bitmap(source: &ImageSource) -> Result<Bitmap> {
    let bitmap = match source {
        ImageSource::Path(path) => {
            let img = image::open(path)
                .map_err(|e| Error::ImageLoad(format!("{}: {}", path.display(), e)))?;
            Bitmap::new(img.to_rgba8())
        }
        ImageSource::Bytes(bytes) => decode_bytes(bytes)?,
        ImageSource::DataUrl(url) => decode_bytes(&decode_data_url(url)?)?,
        ImageSource::Url(url) => fetch_remote(url)?,
    };
    debug!(
        source = %source.describe(),
        width = bitmap.width(),
        height = bitmap.height(),
        "decoded image source"
    );
    Ok(bitmap)
}

fn decode_bytes(bytes: &[u8]) -> Result<Bitmap> {
    let img = image::load_from_memory(bytes)?;
    Ok(Bitmap::new(img.to_rgba8()))
}

/// Extracts the base64 payload from a `data:*;base64,...` URL.
fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_mime, data)| data)
        .ok_or_else(|| Error::ImageLoad("malformed data URL".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::ImageLoad(format!("data URL base64: {}", e)))
}

#[cfg(feature = "fetch")]
fn fetch_remote(url: &str) -> Result<Bitmap> {
    let response = reqwest::blocking::get(url)
        .map_err(|e| Error::ImageLoad(format!("{}: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(Error::ImageLoad(format!("{}: HTTP {}", url, response.status())));
    }
    let bytes = response
        .bytes()
        .map_err(|e| Error::ImageLoad(format!("{}: {}", url, e)))?;
    decode_bytes(&bytes)
}

#[cfg(not(feature = "fetch"))]
fn fetch_remote(url: &str) -> Result<Bitmap> {
    Err(Error::PixelAccessDenied(format!(
        "remote source {} requires the `fetch` feature for pixel readback",
        url
    )))
}

// ============================================================================
// Serialization
// ============================================================================

/// Encodes a bitmap as PNG bytes.
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    bitmap
        .pixels()
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::ExportFailure(format!("PNG encode: {}", e)))?;
    Ok(buf.into_inner())
}

/// Encodes a bitmap as a `data:image/png;base64,...` URL.
pub fn encode_png_data_url(bitmap: &Bitmap) -> Result<String> {
    let bytes = encode_png(bitmap)?;
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/png;base64,{}", payload))
}

/// Derives a download filename from free-form label parts.
///
/// ASCII only, lower-cased, spaces collapsed to underscores, everything
/// else outside `[a-z0-9_-]` dropped.
pub fn suggested_filename(parts: &[&str], extension: &str) -> String {
    let stem: Vec<String> = parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| slugify(p))
        .filter(|s| !s.is_empty())
        .collect();
    let stem = if stem.is_empty() {
        "export".to_string()
    } else {
        stem.join("_")
    };
    format!("{}.{}", stem, extension)
}

fn slugify(input: &str) -> String {
    input
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
