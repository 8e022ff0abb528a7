//! Bitmap and geometry value types.
//!
//! Every pixel algorithm in this crate reads a [`Bitmap`] and produces a
//! new one; nothing mutates a shared buffer in place. This keeps the
//! segmentation and compositing code unit-testable without any canvas or
//! windowing environment.

use image::RgbaImage;

use crate::error::{Error, Result};

// ============================================================================
// Bitmap
// ============================================================================

/// A decoded raster image: width, height, and a dense RGBA buffer.
///
/// Wraps [`image::RgbaImage`] so the rest of the crate speaks one pixel
/// type. Treat values as immutable once decoded; transformations return
/// new bitmaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    data: RgbaImage,
}

impl Bitmap {
    /// Wraps an already-decoded RGBA image.
    pub fn new(data: RgbaImage) -> Self {
        Self { data }
    }

    /// Creates a fully transparent bitmap of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            data: RgbaImage::new(width, height),
        }
    }

    /// Creates a bitmap from a raw row-major RGBA byte buffer.
    ///
    /// Fails with [`Error::PixelAccessDenied`] when the buffer does not
    /// match `width * height * 4` bytes — the pixels of such a source
    /// cannot be meaningfully read.
    pub fn from_raw(width: u32, height: u32, buf: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if buf.len() != expected {
            return Err(Error::PixelAccessDenied(format!(
                "raw buffer is {} bytes, expected {} for {}x{}",
                buf.len(),
                expected,
                width,
                height
            )));
        }
        let data = RgbaImage::from_raw(width, height, buf).ok_or_else(|| {
            Error::PixelAccessDenied("raw buffer rejected by image container".into())
        })?;
        Ok(Self { data })
    }

    /// Creates a bitmap filled with a single RGBA color.
    pub fn from_pixel(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            data: RgbaImage::from_pixel(width, height, image::Rgba(rgba)),
        }
    }

    pub fn width(&self) -> u32 {
        self.data.width()
    }

    pub fn height(&self) -> u32 {
        self.data.height()
    }

    /// Aspect ratio as width / height. Zero-height bitmaps report 1.0.
    pub fn aspect(&self) -> f32 {
        if self.data.height() == 0 {
            1.0
        } else {
            self.data.width() as f32 / self.data.height() as f32
        }
    }

    /// Borrow the underlying RGBA buffer.
    pub fn pixels(&self) -> &RgbaImage {
        &self.data
    }

    /// Mutable access for the compositing primitives in [`crate::blend`].
    pub(crate) fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.data
    }

    /// Consumes the bitmap, returning the raw image buffer.
    pub fn into_inner(self) -> RgbaImage {
        self.data
    }

    /// Reads one pixel. Panics out of bounds, like the underlying buffer.
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        self.data.get_pixel(x, y).0
    }

    /// Fraction of pixels whose alpha exceeds `threshold`.
    ///
    /// Used to decide whether a source still carries a flat background
    /// (coverage near 1.0) or has already been segmented.
    pub fn opaque_fraction(&self, threshold: u8) -> f32 {
        let total = self.data.width() as u64 * self.data.height() as u64;
        if total == 0 {
            return 0.0;
        }
        let opaque = self
            .data
            .pixels()
            .filter(|p| p.0[3] > threshold)
            .count() as u64;
        opaque as f32 / total as f32
    }
}

// ============================================================================
// RectRel
// ============================================================================

/// A rectangle in relative coordinates (0..1 of some reference size).
///
/// Print areas are authored this way so one garment photo works at any
/// preview or export resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectRel {
    /// Left edge, as a fraction of the reference width.
    pub x: f32,
    /// Top edge, as a fraction of the reference height.
    pub y: f32,
    /// Width fraction.
    pub width: f32,
    /// Height fraction.
    pub height: f32,
}

impl RectRel {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Resolves this rectangle against a concrete pixel size.
    pub fn to_pixels(&self, ref_width: f32, ref_height: f32) -> RectPx {
        RectPx {
            x: self.x * ref_width,
            y: self.y * ref_height,
            width: self.width * ref_width,
            height: self.height * ref_height,
        }
    }
}

/// A rectangle in pixel coordinates, kept as floats until rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectPx {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectPx {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// True when the point lies inside the rectangle (inclusive left/top,
    /// exclusive right/bottom).
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_short_buffer() {
        let result = Bitmap::from_raw(4, 4, vec![0u8; 10]);
        assert!(matches!(result, Err(Error::PixelAccessDenied(_))));
    }

    #[test]
    fn from_raw_accepts_exact_buffer() {
        let bmp = Bitmap::from_raw(2, 2, vec![255u8; 16]).unwrap();
        assert_eq!(bmp.width(), 2);
        assert_eq!(bmp.get(1, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn opaque_fraction_counts_alpha() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 0, 0, 255]));
        // remaining two pixels stay alpha 0
        let bmp = Bitmap::new(img);
        assert_eq!(bmp.opaque_fraction(8), 0.5);
    }

    #[test]
    fn rect_rel_resolves_against_reference() {
        let rel = RectRel::new(0.25, 0.1, 0.5, 0.4);
        let px = rel.to_pixels(400.0, 1000.0);
        assert_eq!(px.x, 100.0);
        assert_eq!(px.y, 100.0);
        assert_eq!(px.width, 200.0);
        assert_eq!(px.height, 400.0);
        assert_eq!(px.center(), (200.0, 300.0));
    }

    #[test]
    fn rect_px_contains_edges() {
        let rect = RectPx {
            x: 10.0,
            y: 10.0,
            width: 10.0,
            height: 10.0,
        };
        assert!(rect.contains(10.0, 10.0));
        assert!(rect.contains(19.9, 19.9));
        assert!(!rect.contains(20.0, 20.0));
        assert!(!rect.contains(9.9, 15.0));
    }
}
