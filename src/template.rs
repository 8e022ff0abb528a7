//! Template stencils: constrain artwork to a recognizable shape.
//!
//! A stencil's opaque region is the shape (skateboard deck, surfboard,
//! ...). Keep-inside masking survives only inside that region
//! (destination-in); keep-outside removes it (destination-out). The
//! stencil is applied to the composited artwork buffer after all layers
//! are drawn and before any caption.

use std::collections::HashMap;

use crate::bitmap::Bitmap;
use crate::blend;
use crate::io::ImageSource;

// ============================================================================
// Stencil
// ============================================================================

/// A named stencil with its masking mode.
#[derive(Debug, Clone)]
pub struct TemplateStencil {
    pub name: String,
    pub stencil: Bitmap,
    /// True: artwork survives only inside the opaque region.
    /// False: the opaque region is cut out of the artwork.
    pub keep_inside: bool,
}

impl TemplateStencil {
    pub fn new(name: impl Into<String>, stencil: Bitmap, keep_inside: bool) -> Self {
        Self {
            name: name.into(),
            stencil,
            keep_inside,
        }
    }

    /// Masks `artwork` in place. The stencil is stretched to the artwork
    /// buffer's dimensions first, so one stencil asset works at both
    /// preview and export resolutions.
    pub fn apply(&self, artwork: &mut Bitmap) {
        if artwork.width() == 0 || artwork.height() == 0 {
            return;
        }
        let sized = if self.stencil.width() == artwork.width()
            && self.stencil.height() == artwork.height()
        {
            self.stencil.clone()
        } else {
            blend::resize_to(&self.stencil, artwork.width(), artwork.height())
        };
        if self.keep_inside {
            blend::destination_in(artwork, &sized);
        } else {
            blend::destination_out(artwork, &sized);
        }
    }

    /// Draws the stencil semi-transparently over `canvas` so the author
    /// can see where the shape falls. Guidance only; exports go through
    /// [`apply`](Self::apply) and never include this overlay.
    pub fn preview_overlay(&self, canvas: &mut Bitmap, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity == 0.0 || canvas.width() == 0 || canvas.height() == 0 {
            return;
        }
        let mut sized = if self.stencil.width() == canvas.width()
            && self.stencil.height() == canvas.height()
        {
            self.stencil.clone()
        } else {
            blend::resize_to(&self.stencil, canvas.width(), canvas.height())
        };
        for pixel in sized.pixels_mut().pixels_mut() {
            pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
        }
        blend::composite_over(canvas, &sized, 0, 0);
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Name → source lookup for the fixed stencil assets the host serves.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    entries: HashMap<String, ImageSource>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock catalog, with stencils resolved under `base_url`.
    pub fn stock(base_url: &str) -> Self {
        let mut catalog = Self::new();
        for name in ["skateboard", "surfboard", "snowboard", "body"] {
            let url = format!("{}/{}.png", base_url.trim_end_matches('/'), name);
            catalog.register(name, ImageSource::from_str_ref(&url));
        }
        catalog
    }

    pub fn register(&mut self, name: impl Into<String>, source: ImageSource) {
        self.entries.insert(name.into(), source);
    }

    pub fn resolve(&self, name: &str) -> Option<&ImageSource> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// A 10x10 stencil whose opaque region is the central 4x4 square.
    fn square_stencil() -> Bitmap {
        let mut stencil = Bitmap::blank(10, 10);
        for y in 3..7 {
            for x in 3..7 {
                stencil.pixels_mut().put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        stencil
    }

    #[test]
    fn keep_inside_clears_everything_outside() {
        let mut artwork = Bitmap::from_pixel(10, 10, [200, 50, 50, 255]);
        TemplateStencil::new("square", square_stencil(), true).apply(&mut artwork);

        for y in 0..10 {
            for x in 0..10 {
                let inside = (3..7).contains(&x) && (3..7).contains(&y);
                let alpha = artwork.get(x, y)[3];
                if inside {
                    assert_eq!(alpha, 255, "inside pixel ({x},{y}) must survive");
                } else {
                    assert_eq!(alpha, 0, "outside pixel ({x},{y}) must be cleared");
                }
            }
        }
    }

    #[test]
    fn keep_outside_clears_everything_inside() {
        let mut artwork = Bitmap::from_pixel(10, 10, [200, 50, 50, 255]);
        TemplateStencil::new("square", square_stencil(), false).apply(&mut artwork);

        for y in 0..10 {
            for x in 0..10 {
                let inside = (3..7).contains(&x) && (3..7).contains(&y);
                let alpha = artwork.get(x, y)[3];
                if inside {
                    assert_eq!(alpha, 0, "inside pixel ({x},{y}) must be cleared");
                } else {
                    assert_eq!(alpha, 255, "outside pixel ({x},{y}) must survive");
                }
            }
        }
    }

    #[test]
    fn stencil_is_stretched_to_artwork_size() {
        // Same shape at 2x the resolution: the center stays opaque.
        let mut artwork = Bitmap::from_pixel(20, 20, [0, 0, 200, 255]);
        TemplateStencil::new("square", square_stencil(), true).apply(&mut artwork);
        assert_eq!(artwork.get(10, 10)[3], 255);
        assert_eq!(artwork.get(1, 1)[3], 0);
    }

    #[test]
    fn preview_overlay_tints_without_masking() {
        // Dark stencil over a white canvas at half opacity: the shape
        // region darkens, everything else keeps its pixels unchanged.
        let mut stencil = Bitmap::blank(10, 10);
        for y in 3..7 {
            for x in 3..7 {
                stencil.pixels_mut().put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let template = TemplateStencil::new("square", stencil, true);

        let mut canvas = Bitmap::from_pixel(10, 10, [255, 255, 255, 255]);
        template.preview_overlay(&mut canvas, 0.5);

        let center = canvas.get(5, 5);
        assert!(center[0] < 200, "shape region must darken, got {center:?}");
        assert_eq!(center[3], 255, "overlay never erodes canvas alpha");
        assert_eq!(canvas.get(0, 0), [255, 255, 255, 255]);

        // Zero opacity is a no-op.
        let mut untouched = Bitmap::from_pixel(10, 10, [255, 255, 255, 255]);
        template.preview_overlay(&mut untouched, 0.0);
        assert_eq!(untouched.get(5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn stock_catalog_knows_the_fixed_shapes() {
        let catalog = TemplateCatalog::stock("https://assets.example.com/stencils");
        for name in ["skateboard", "surfboard", "snowboard", "body"] {
            assert!(catalog.resolve(name).is_some(), "missing {name}");
        }
        assert!(catalog.resolve("teapot").is_none());
        assert!(matches!(
            catalog.resolve("skateboard"),
            Some(ImageSource::Url(_))
        ));
    }
}
