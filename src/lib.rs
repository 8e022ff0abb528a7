//! merch-studio: Artwork compositing engine for merchandise mockups
//!
//! This crate turns user artwork (NFT images, uploads) into printable
//! merchandise designs: chroma-key background removal, manual mask
//! touch-up with undo/redo, a transformable layer stack, template
//! stencils, and dual-resolution export (shareable mockup plus a
//! production print file).
//!
//! # Example
//!
//! ```no_run
//! use merch_studio::{
//!     Bitmap, ChromaKeyConfig, DesignStudio, PreviewMetrics, Product, RectRel,
//! };
//! use std::time::Instant;
//!
//! # fn main() -> merch_studio::Result<()> {
//! let product = Product {
//!     label: "Classic Tee".into(),
//!     side: "front".into(),
//!     mockup: Bitmap::blank(1000, 1200),
//!     print_area: RectRel::new(0.3, 0.25, 0.4, 0.35),
//! };
//!
//! let mut studio = DesignStudio::new(product);
//! let id = studio.add_layer_from_source("https://cdn.example.com/ape.png", "Ape #42")?;
//!
//! // Key out the sky-blue backdrop; the keyer runs after a short debounce.
//! let now = Instant::now();
//! studio.set_remove_bg(id, Some(ChromaKeyConfig::single([135, 206, 235], 0.4, 0.1)), now);
//! studio.poll_reprocess(Instant::now());
//!
//! let artifact = studio.export_mockup(PreviewMetrics::new(500.0, 600.0), 1200)?;
//! std::fs::write(&artifact.filename, &artifact.png)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Serializable Profiles
//!
//! Sessions round-trip through [`DesignProfile`] via the
//! [`Configurable`] trait:
//!
//! ```no_run
//! use merch_studio::{Configurable, DesignProfile, DesignStudio};
//! # fn restore(mut studio: DesignStudio, json: &str) -> merch_studio::Result<()> {
//! let profile = DesignProfile::from_json(json).map_err(|e| {
//!     merch_studio::Error::ImageLoad(e.to_string())
//! })?;
//! studio.apply_profile(&profile)?;
//!
//! let exported = studio.export_profile();
//! let json = exported.to_json().unwrap();
//! # Ok(())
//! # }
//! ```

mod bitmap;
mod blend;
mod chroma;
mod color;
mod error;
mod export;
mod io;
mod layer;
mod mask;
mod profile;
mod studio;
mod template;

pub use bitmap::{Bitmap, RectPx, RectRel};
pub use chroma::{auto_key, chroma_key, estimate_background, ChromaKeyConfig};
pub use color::{
    hsv_to_rgb, hue_distance, key_distance, normalized_key_distance, rgb_to_hsv, HsvColor,
};
pub use error::{Error, Result};
pub use export::{
    package, render_mockup, render_print_file, Caption, ExportArtifact, PreviewMetrics, Product,
    MOCKUP_EXPORT_WIDTH, PRINT_FILE_HEIGHT, PRINT_FILE_WIDTH,
};
pub use io::{encode_png, encode_png_data_url, load_bitmap, suggested_filename, ImageSource};
pub use layer::{
    ArtLayer, Debouncer, DragSession, LayerId, LayerStack, TransformUpdate,
};
pub use mask::{Brush, BrushMode, Mask, MaskEditor};
pub use profile::{
    DesignProfile, LayerSettings, RemoveBgSettings, TemplateSettings,
};
pub use studio::{Configurable, DesignStudio};
pub use template::{TemplateCatalog, TemplateStencil};
