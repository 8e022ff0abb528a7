//! Pixel compositing primitives.
//!
//! Source-over blending plus the two stencil operators (destination-in /
//! destination-out) that template masking builds on, and the cover-fit
//! placement used for garment mockup backgrounds.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::bitmap::Bitmap;

// ============================================================================
// Source-over
// ============================================================================

/// Composites `src` onto `dest` at the specified position.
///
/// Uses standard alpha blending (source over destination). Pixels that
/// fall outside the destination are skipped.
pub fn composite_over(dest: &mut Bitmap, src: &Bitmap, x: i32, y: i32) {
    let dest_width = dest.width() as i32;
    let dest_height = dest.height() as i32;
    let src_img = src.pixels().clone();
    let dest_img = dest.pixels_mut();

    for sy in 0..src_img.height() {
        for sx in 0..src_img.width() {
            let dx = x + sx as i32;
            let dy = y + sy as i32;
            if dx < 0 || dy < 0 || dx >= dest_width || dy >= dest_height {
                continue;
            }

            let src_pixel = src_img.get_pixel(sx, sy);
            let dst_pixel = dest_img.get_pixel(dx as u32, dy as u32);
            let blended = alpha_blend(*src_pixel, *dst_pixel);
            dest_img.put_pixel(dx as u32, dy as u32, blended);
        }
    }
}

/// Alpha blends two RGBA pixels (source over destination).
pub fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

// ============================================================================
// Stencil operators
// ============================================================================

/// Destination-in: keeps only the parts of `dest` where `stencil` is
/// opaque. The stencil must have the same dimensions as `dest`.
///
/// RGB is left untouched; only alpha is scaled by the stencil's alpha.
pub fn destination_in(dest: &mut Bitmap, stencil: &Bitmap) {
    debug_assert_eq!(dest.width(), stencil.width());
    debug_assert_eq!(dest.height(), stencil.height());
    let stencil_img = stencil.pixels().clone();
    for (x, y, pixel) in dest.pixels_mut().enumerate_pixels_mut() {
        let mask_a = stencil_img.get_pixel(x, y).0[3] as u16;
        pixel.0[3] = ((pixel.0[3] as u16 * mask_a) / 255) as u8;
    }
}

/// Destination-out: removes the parts of `dest` where `stencil` is opaque,
/// keeping everything outside it.
pub fn destination_out(dest: &mut Bitmap, stencil: &Bitmap) {
    debug_assert_eq!(dest.width(), stencil.width());
    debug_assert_eq!(dest.height(), stencil.height());
    let stencil_img = stencil.pixels().clone();
    for (x, y, pixel) in dest.pixels_mut().enumerate_pixels_mut() {
        let mask_a = stencil_img.get_pixel(x, y).0[3] as u16;
        pixel.0[3] = ((pixel.0[3] as u16 * (255 - mask_a)) / 255) as u8;
    }
}

// ============================================================================
// Placement helpers
// ============================================================================

/// Scales `src` to the exact target size with a triangle filter.
pub fn resize_to(src: &Bitmap, width: u32, height: u32) -> Bitmap {
    let resized = imageops::resize(src.pixels(), width.max(1), height.max(1), FilterType::Triangle);
    Bitmap::new(resized)
}

/// Cover-fits `src` into a `width x height` canvas: scale to fill,
/// centered, overflow cropped. The classic CSS `object-fit: cover`.
pub fn cover_fit(src: &Bitmap, width: u32, height: u32) -> Bitmap {
    if src.width() == 0 || src.height() == 0 || width == 0 || height == 0 {
        return Bitmap::blank(width, height);
    }

    let scale = (width as f32 / src.width() as f32).max(height as f32 / src.height() as f32);
    let scaled_w = (src.width() as f32 * scale).ceil() as u32;
    let scaled_h = (src.height() as f32 * scale).ceil() as u32;
    let scaled = imageops::resize(src.pixels(), scaled_w, scaled_h, FilterType::Triangle);

    let crop_x = (scaled_w.saturating_sub(width)) / 2;
    let crop_y = (scaled_h.saturating_sub(height)) / 2;

    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let sx = (x + crop_x).min(scaled_w - 1);
            let sy = (y + crop_y).min(scaled_h - 1);
            out.put_pixel(x, y, *scaled.get_pixel(sx, sy));
        }
    }
    Bitmap::new(out)
}

// ============================================================================
// Tests
// ============================================================================
