//! Final compositing at preview and export resolutions.
//!
//! Two export intents share one rendering core:
//!
//! - **Mockup export**: garment photo included, fixed width (social
//!   sharing). Caption gets a dark stroke under a white fill so it reads
//!   over photos.
//! - **Print-file export**: production resolution, transparent
//!   background, garment excluded (manufacturing handoff).
//!
//! Layer positions are authored in *preview* pixels as offsets from the
//! print-area center; the export maps them through scale factors computed
//! from the live preview element's size at call time. A layer at (0, 0)
//! therefore lands exactly on the print-area center at any resolution.
//!
//! Any failure aborts the whole export — no partial raster is ever
//! returned.

use ab_glyph::{FontArc, PxScale};
use image::Rgba;
use imageproc::drawing::{draw_text_mut, text_size};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::{debug, info};

use crate::bitmap::{Bitmap, RectPx, RectRel};
use crate::blend;
use crate::error::{Error, Result};
use crate::io;
use crate::layer::ArtLayer;
use crate::template::TemplateStencil;

/// Default mockup export width in pixels.
pub const MOCKUP_EXPORT_WIDTH: u32 = 1200;
/// Default production print-file resolution.
pub const PRINT_FILE_WIDTH: u32 = 4500;
pub const PRINT_FILE_HEIGHT: u32 = 5400;
/// Caption height as a fraction of the canvas height.
const CAPTION_HEIGHT_FRACTION: f32 = 0.06;

// ============================================================================
// Products and previews
// ============================================================================

/// A physical merchandise mockup: garment photo plus the print area
/// artwork may legally occupy, in relative coordinates.
#[derive(Debug, Clone)]
pub struct Product {
    /// Display label, e.g. "Classic Tee".
    pub label: String,
    /// Which side this mockup shows, e.g. "front".
    pub side: String,
    /// The garment photo.
    pub mockup: Bitmap,
    /// Where artwork may be placed, relative to the mockup (0..1).
    pub print_area: RectRel,
}

/// The live preview element's rendered size, read at export time — the
/// preview may have resized since authoring began, so never cache this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewMetrics {
    pub width: f32,
    pub height: f32,
}

impl PreviewMetrics {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn validate(&self) -> Result<()> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::ExportFailure(format!(
                "preview element has no size ({} x {})",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A caption drawn beneath the artwork, after template masking.
#[derive(Clone)]
pub struct Caption {
    pub text: String,
    /// The caller supplies the font; the engine bundles none.
    pub font: FontArc,
}

impl Caption {
    pub fn new(text: impl Into<String>, font: FontArc) -> Self {
        Self {
            text: text.into(),
            font,
        }
    }
}

/// A finished export: encoded raster plus the suggested download name.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub png: Vec<u8>,
    pub filename: String,
}

// ============================================================================
// Entry points
// ============================================================================

/// Renders the shareable mockup: garment photo cover-fit behind the
/// artwork, `width` pixels wide, height following the mockup's aspect.
pub fn render_mockup(
    product: &Product,
    layers: &[ArtLayer],
    template: Option<&TemplateStencil>,
    caption: Option<&Caption>,
    preview: PreviewMetrics,
    width: u32,
) -> Result<Bitmap> {
    preview.validate()?;
    if width == 0 || product.mockup.width() == 0 || product.mockup.height() == 0 {
        return Err(Error::ExportFailure("mockup export has zero size".into()));
    }

    let height = (width as f32 / product.mockup.aspect()).round().max(1.0) as u32;
    let scale_x = width as f32 / preview.width;
    let scale_y = height as f32 / preview.height;
    let print_rect = product.print_area.to_pixels(width as f32, height as f32);
    debug!(width, height, scale_x, scale_y, "mockup export geometry");

    let mut canvas = blend::cover_fit(&product.mockup, width, height);
    let mut artwork = render_artwork(layers, width, height, print_rect, scale_x, scale_y)?;
    if let Some(stencil) = template {
        stencil.apply(&mut artwork);
    }
    composite_clipped(&mut canvas, &artwork, print_rect);

    if let Some(caption) = caption {
        draw_caption(&mut canvas, caption, CaptionStyle::StrokedFill);
    }

    info!(
        product = %product.label,
        layers = layers.len(),
        width,
        height,
        "mockup export rendered"
    );
    Ok(canvas)
}

/// Renders the production print file: transparent background, no
/// garment, the canvas *is* the print area at the target resolution.
pub fn render_print_file(
    product: &Product,
    layers: &[ArtLayer],
    template: Option<&TemplateStencil>,
    caption: Option<&Caption>,
    preview: PreviewMetrics,
    width: u32,
    height: u32,
) -> Result<Bitmap> {
    preview.validate()?;
    if width == 0 || height == 0 {
        return Err(Error::ExportFailure("print file has zero size".into()));
    }

    // The preview-space print area is what maps onto this canvas.
    let preview_print_w = preview.width * product.print_area.width;
    let preview_print_h = preview.height * product.print_area.height;
    if preview_print_w <= 0.0 || preview_print_h <= 0.0 {
        return Err(Error::ExportFailure("print area has no preview size".into()));
    }
    let scale_x = width as f32 / preview_print_w;
    let scale_y = height as f32 / preview_print_h;
    let print_rect = RectPx {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
    };
    debug!(width, height, scale_x, scale_y, "print-file export geometry");

    let mut canvas = Bitmap::blank(width, height);
    let mut artwork = render_artwork(layers, width, height, print_rect, scale_x, scale_y)?;
    if let Some(stencil) = template {
        stencil.apply(&mut artwork);
    }
    composite_clipped(&mut canvas, &artwork, print_rect);

    if let Some(caption) = caption {
        draw_caption(&mut canvas, caption, CaptionStyle::PlainFill);
    }

    info!(
        product = %product.label,
        layers = layers.len(),
        width,
        height,
        "print file rendered"
    );
    Ok(canvas)
}

/// Encodes a rendered export and derives its download filename from the
/// product label and side.
pub fn package(bitmap: &Bitmap, product: &Product) -> Result<ExportArtifact> {
    let png = io::encode_png(bitmap)?;
    let filename = io::suggested_filename(&[&product.label, &product.side], "png");
    Ok(ExportArtifact { png, filename })
}

// ============================================================================
// Rendering core
// ============================================================================

/// Draws every layer, bottom to top, into a transparent canvas-sized
/// artwork buffer.
fn render_artwork(
    layers: &[ArtLayer],
    canvas_w: u32,
    canvas_h: u32,
    print_rect: RectPx,
    scale_x: f32,
    scale_y: f32,
) -> Result<Bitmap> {
    let mut artwork = Bitmap::blank(canvas_w, canvas_h);
    let (print_cx, print_cy) = print_rect.center();

    for layer in layers {
        let source = layer.effective_bitmap();
        if source.width() == 0 || source.height() == 0 {
            return Err(Error::ExportFailure(format!(
                "layer '{}' has an empty bitmap",
                layer.label
            )));
        }

        // Scale 1.0 = the full print-area height; width keeps the
        // source aspect.
        let target_h = print_rect.height * layer.scale;
        let target_w = target_h * source.aspect();
        if target_h < 1.0 || target_w < 1.0 {
            continue;
        }

        let placed = place_layer(source, target_w as u32, target_h as u32, layer.rotation);
        let center_x = print_cx + layer.x * scale_x;
        let center_y = print_cy + layer.y * scale_y;
        let left = (center_x - placed.width() as f32 / 2.0).round() as i32;
        let top = (center_y - placed.height() as f32 / 2.0).round() as i32;
        blend::composite_over(&mut artwork, &placed, left, top);
    }

    Ok(artwork)
}

/// Resizes the source to its draw size and rotates it about its center.
///
/// The resized image is padded into a diagonal-sized square first so the
/// rotation never clips corners.
fn place_layer(source: &Bitmap, width: u32, height: u32, rotation_degrees: f32) -> Bitmap {
    let resized = blend::resize_to(source, width, height);
    if rotation_degrees.rem_euclid(360.0) == 0.0 {
        return resized;
    }

    let diagonal = ((width as f32).hypot(height as f32)).ceil() as u32;
    let mut padded = Bitmap::blank(diagonal, diagonal);
    let offset_x = ((diagonal - width) / 2) as i32;
    let offset_y = ((diagonal - height) / 2) as i32;
    blend::composite_over(&mut padded, &resized, offset_x, offset_y);

    let rotated = rotate_about_center(
        padded.pixels(),
        rotation_degrees.to_radians(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    );
    Bitmap::new(rotated)
}

/// Source-over composites `src` onto `dest`, but only inside `clip` —
/// artwork never bleeds outside the print area.
fn composite_clipped(dest: &mut Bitmap, src: &Bitmap, clip: RectPx) {
    debug_assert_eq!(dest.width(), src.width());
    debug_assert_eq!(dest.height(), src.height());

    let x0 = clip.x.max(0.0) as u32;
    let y0 = clip.y.max(0.0) as u32;
    let x1 = (clip.right().ceil() as u32).min(dest.width());
    let y1 = (clip.bottom().ceil() as u32).min(dest.height());

    let src_img = src.pixels().clone();
    let dest_img = dest.pixels_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            let blended = blend::alpha_blend(*src_img.get_pixel(x, y), *dest_img.get_pixel(x, y));
            dest_img.put_pixel(x, y, blended);
        }
    }
}

// ============================================================================
// Captions
// ============================================================================

enum CaptionStyle {
    /// Dark stroke under a white fill, legible over photos.
    StrokedFill,
    /// Plain fill for transparent-background print files.
    PlainFill,
}

fn draw_caption(canvas: &mut Bitmap, caption: &Caption, style: CaptionStyle) {
    let text = caption.text.trim();
    if text.is_empty() {
        return;
    }

    let size = canvas.height() as f32 * CAPTION_HEIGHT_FRACTION;
    let scale = PxScale::from(size);
    let (text_w, text_h) = text_size(scale, &caption.font, text);
    let x = (canvas.width() as i32 - text_w as i32) / 2;
    let y = canvas.height() as i32 - text_h as i32 - (size * 0.6) as i32;

    let img = canvas.pixels_mut();
    if matches!(style, CaptionStyle::StrokedFill) {
        let stroke = Rgba([20, 20, 20, 255]);
        let offset = (size * 0.04).max(1.0) as i32;
        for (dx, dy) in [
            (-offset, 0),
            (offset, 0),
            (0, -offset),
            (0, offset),
            (-offset, -offset),
            (offset, -offset),
            (-offset, offset),
            (offset, offset),
        ] {
            draw_text_mut(img, stroke, x + dx, y + dy, scale, &caption.font, text);
        }
    }
    let fill = match style {
        CaptionStyle::StrokedFill => Rgba([255, 255, 255, 255]),
        CaptionStyle::PlainFill => Rgba([20, 20, 20, 255]),
    };
    draw_text_mut(img, fill, x, y, scale, &caption.font, text);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerStack, TransformUpdate};

    fn square_product(mockup_color: [u8; 4]) -> Product {
        Product {
            label: "Classic Tee".into(),
            side: "front".into(),
            mockup: Bitmap::from_pixel(100, 100, mockup_color),
            print_area: RectRel::new(0.25, 0.25, 0.5, 0.5),
        }
    }

    fn preview() -> PreviewMetrics {
        PreviewMetrics::new(400.0, 400.0)
    }

    #[test]
    fn centered_layer_maps_to_print_area_center() {
        let product = square_product([255, 255, 255, 255]);
        let mut stack = LayerStack::new();
        let id = stack.add_layer(Bitmap::from_pixel(10, 10, [200, 0, 0, 255]), "art");
        stack.set_transform(id, TransformUpdate { scale: Some(0.1), ..Default::default() });

        for width in [800u32, 1200, 333] {
            let out =
                render_mockup(&product, stack.layers(), None, None, preview(), width).unwrap();
            // Print area is the central half; its center is the canvas
            // center for this square product.
            let cx = out.width() / 2;
            let cy = out.height() / 2;
            let pixel = out.get(cx, cy);
            assert!(pixel[0] > 150 && pixel[1] < 100, "at width {width}: {pixel:?}");
        }
    }

    #[test]
    fn artwork_is_clipped_to_print_area() {
        let product = square_product([255, 255, 255, 255]);
        let mut stack = LayerStack::new();
        let id = stack.add_layer(Bitmap::from_pixel(10, 10, [200, 0, 0, 255]), "art");
        // Push the layer far left, well past the print-area edge.
        stack.set_transform(
            id,
            TransformUpdate { x: Some(-180.0), scale: Some(0.3), ..Default::default() },
        );

        let out = render_mockup(&product, stack.layers(), None, None, preview(), 400).unwrap();
        // Print area spans x in [100, 300) at this size; everything left
        // of it must still be bare garment.
        for x in 0..100 {
            assert_eq!(out.get(x, 200), [255, 255, 255, 255], "bleed at x={x}");
        }
    }

    #[test]
    fn print_file_has_transparent_background() {
        let product = square_product([255, 255, 255, 255]);
        let mut stack = LayerStack::new();
        let id = stack.add_layer(Bitmap::from_pixel(10, 10, [0, 180, 40, 255]), "art");
        stack.set_transform(id, TransformUpdate { scale: Some(0.2), ..Default::default() });

        let out = render_print_file(
            &product,
            stack.layers(),
            None,
            None,
            preview(),
            450,
            540,
        )
        .unwrap();
        assert_eq!(out.width(), 450);
        assert_eq!(out.height(), 540);
        // Corners: no garment, no artwork.
        assert_eq!(out.get(0, 0)[3], 0);
        assert_eq!(out.get(449, 539)[3], 0);
        // Center: the layer.
        let center = out.get(225, 270);
        assert!(center[3] > 0 && center[1] > 100, "{center:?}");
    }

    #[test]
    fn rotation_turns_the_layer() {
        let product = square_product([255, 255, 255, 255]);
        // Left half red, right half blue.
        let mut art = Bitmap::from_pixel(20, 10, [0, 0, 220, 255]);
        for y in 0..10 {
            for x in 0..10 {
                art.pixels_mut().put_pixel(x, y, image::Rgba([220, 0, 0, 255]));
            }
        }

        let mut stack = LayerStack::new();
        let id = stack.add_layer(art, "art");
        stack.set_transform(
            id,
            TransformUpdate { scale: Some(0.25), rotation: Some(180.0), ..Default::default() },
        );

        let out = render_print_file(&product, stack.layers(), None, None, preview(), 400, 400)
            .unwrap();
        // After a half turn the blue half sits left of center.
        let left = out.get(160, 200);
        assert!(left[2] > left[0], "expected blue left of center, got {left:?}");
        let right = out.get(240, 200);
        assert!(right[0] > right[2], "expected red right of center, got {right:?}");
    }

    #[test]
    fn template_masking_constrains_the_export() {
        let product = square_product([255, 255, 255, 255]);
        let mut stack = LayerStack::new();
        let id = stack.add_layer(Bitmap::from_pixel(10, 10, [200, 0, 0, 255]), "art");
        stack.set_transform(id, TransformUpdate { scale: Some(1.0), ..Default::default() });

        // Stencil opaque only in the central quarter of the canvas.
        let mut stencil = Bitmap::blank(4, 4);
        stencil.pixels_mut().put_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        stencil.pixels_mut().put_pixel(2, 1, image::Rgba([255, 255, 255, 255]));
        stencil.pixels_mut().put_pixel(1, 2, image::Rgba([255, 255, 255, 255]));
        stencil.pixels_mut().put_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
        let keep_inside = TemplateStencil::new("square", stencil.clone(), true);

        let out = render_print_file(
            &product,
            stack.layers(),
            Some(&keep_inside),
            None,
            preview(),
            400,
            400,
        )
        .unwrap();
        // Center (inside the stencil) keeps artwork; the border is cleared
        // even though the full-size layer covered it.
        assert!(out.get(200, 200)[3] > 0);
        assert_eq!(out.get(10, 200)[3], 0);

        let keep_outside = TemplateStencil::new("square", stencil, false);
        let out = render_print_file(
            &product,
            stack.layers(),
            Some(&keep_outside),
            None,
            preview(),
            400,
            400,
        )
        .unwrap();
        assert_eq!(out.get(200, 200)[3], 0);
        assert!(out.get(10, 200)[3] > 0);
    }

    #[test]
    fn zero_size_preview_aborts_export() {
        let product = square_product([255, 255, 255, 255]);
        let err = render_mockup(
            &product,
            &[],
            None,
            None,
            PreviewMetrics::new(0.0, 400.0),
            800,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ExportFailure(_)));
    }

    #[test]
    fn empty_layer_bitmap_aborts_export() {
        let product = square_product([255, 255, 255, 255]);
        let mut stack = LayerStack::new();
        stack.add_layer(Bitmap::blank(0, 0), "broken");
        let err =
            render_mockup(&product, stack.layers(), None, None, preview(), 800).unwrap_err();
        assert!(matches!(err, Error::ExportFailure(_)));
    }

    #[test]
    fn package_derives_the_filename() {
        let product = square_product([10, 10, 10, 255]);
        let rendered =
            render_mockup(&product, &[], None, None, preview(), 100).unwrap();
        let artifact = package(&rendered, &product).unwrap();
        assert_eq!(artifact.filename, "classic_tee_front.png");
        assert!(!artifact.png.is_empty());
    }
}
