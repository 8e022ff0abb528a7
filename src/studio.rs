//! The top-level authoring session.
//!
//! [`DesignStudio`] ties the pieces together: it owns the layer stack,
//! the selected product, the optional template stencil and caption, and
//! the per-layer debouncers that keep slider drags from re-running the
//! keyer on every event. Hosts drive it with plain method calls and poll
//! [`poll_reprocess`](DesignStudio::poll_reprocess) from their frame or
//! event loop.
//!
//! Sessions persist through [`Configurable`]: `export_profile` captures
//! the full authoring state as a [`DesignProfile`] and `apply_profile`
//! restores it, reloading every layer from its recorded source.

use std::collections::HashMap;
use std::time::Instant;

use ab_glyph::FontArc;
use tracing::{debug, info};

use crate::bitmap::Bitmap;
use crate::chroma::ChromaKeyConfig;
use crate::error::{Error, Result};
use crate::export::{self, Caption, ExportArtifact, PreviewMetrics, Product};
use crate::io::{self, ImageSource};
use crate::layer::{Debouncer, DragSession, LayerId, LayerStack, TransformUpdate};
use crate::profile::{DesignProfile, LayerSettings, RemoveBgSettings, TemplateSettings};
use crate::template::{TemplateCatalog, TemplateStencil};

/// Anything whose state round-trips through a [`DesignProfile`].
pub trait Configurable {
    /// Restores a saved session, replacing the current state.
    fn apply_profile(&mut self, profile: &DesignProfile) -> Result<()>;

    /// Captures the current session as a serializable profile.
    fn export_profile(&self) -> DesignProfile;
}

// ============================================================================
// DesignStudio
// ============================================================================

/// One authoring session for one product.
pub struct DesignStudio {
    stack: LayerStack,
    product: Product,
    catalog: TemplateCatalog,
    template: Option<TemplateStencil>,
    caption_text: Option<String>,
    caption_font: Option<FontArc>,
    selected: Option<LayerId>,
    drag: Option<DragSession>,
    debouncers: HashMap<LayerId, Debouncer>,
    /// Original source reference per layer, kept for profile export.
    sources: HashMap<LayerId, String>,
}

impl DesignStudio {
    pub fn new(product: Product) -> Self {
        Self {
            stack: LayerStack::new(),
            product,
            catalog: TemplateCatalog::new(),
            template: None,
            caption_text: None,
            caption_font: None,
            selected: None,
            drag: None,
            debouncers: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut LayerStack {
        &mut self.stack
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id;
    }

    // ------------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------------

    /// Loads an image reference (URL, data URL, or path), adds it as the
    /// top-most layer, and selects it.
    pub fn add_layer_from_source(
        &mut self,
        reference: &str,
        label: impl Into<String>,
    ) -> Result<LayerId> {
        let source = ImageSource::from_str_ref(reference);
        let bitmap = io::load_bitmap(&source)?;
        let label = label.into();
        info!(%label, source = %source.describe(), "layer added");

        let id = self.stack.add_layer(bitmap, label);
        self.sources.insert(id, reference.to_string());
        self.selected = Some(id);
        Ok(id)
    }

    /// Adds an already-decoded bitmap. The layer's profile source becomes
    /// an inline data URL so the session still round-trips.
    pub fn add_layer(&mut self, bitmap: Bitmap, label: impl Into<String>) -> Result<LayerId> {
        let reference = io::encode_png_data_url(&bitmap)?;
        let id = self.stack.add_layer(bitmap, label);
        self.sources.insert(id, reference);
        self.selected = Some(id);
        Ok(id)
    }

    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let copy = self.stack.duplicate_layer(id)?;
        if let Some(source) = self.sources.get(&id).cloned() {
            self.sources.insert(copy, source);
        }
        self.selected = Some(copy);
        Some(copy)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        self.sources.remove(&id);
        self.debouncers.remove(&id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.stack.remove_layer(id)
    }

    // ------------------------------------------------------------------------
    // Background removal
    // ------------------------------------------------------------------------

    /// Updates a layer's removal config and schedules reprocessing.
    ///
    /// Nothing recomputes here; the keyer runs from
    /// [`poll_reprocess`](Self::poll_reprocess) once the debounce delay
    /// elapses, so a burst of slider events costs one pass.
    pub fn set_remove_bg(
        &mut self,
        id: LayerId,
        config: Option<ChromaKeyConfig>,
        now: Instant,
    ) -> bool {
        if !self.stack.set_remove_bg(id, config) {
            return false;
        }
        self.debouncers.entry(id).or_default().mark(now);
        true
    }

    /// Toggles removal on or off without touching the config.
    pub fn set_remove_bg_enabled(&mut self, id: LayerId, enabled: bool, now: Instant) -> bool {
        let Some(layer) = self.stack.get_mut(id) else {
            return false;
        };
        layer.remove_bg_enabled = enabled;
        if enabled {
            self.debouncers.entry(id).or_default().mark(now);
        }
        true
    }

    /// Runs the keyer for every layer whose debounce deadline has passed.
    /// Returns how many layers were reprocessed.
    pub fn poll_reprocess(&mut self, now: Instant) -> usize {
        let mut processed = 0;
        for (id, debouncer) in &mut self.debouncers {
            if !debouncer.take_ready(now) {
                continue;
            }
            if let Some(layer) = self.stack.get_mut(*id) {
                debug!(layer = %layer.label, "debounce elapsed");
                if layer.ensure_processed() {
                    processed += 1;
                }
            }
        }
        processed
    }

    // ------------------------------------------------------------------------
    // Pointer interaction
    // ------------------------------------------------------------------------

    /// Starts a drag at the cursor, grabbing the top-most layer under it.
    /// Cursor coordinates are preview-pixel offsets from the print-area
    /// center, the same space layer positions live in.
    pub fn begin_drag(&mut self, x: f32, y: f32, preview: PreviewMetrics) -> Option<LayerId> {
        let id = self.stack.hit_test(x, y, preview.width, preview.height)?;
        let layer = self.stack.get(id)?;
        self.drag = Some(DragSession::begin(layer, x, y));
        self.selected = Some(id);
        Some(id)
    }

    /// Moves the dragged layer to track the cursor.
    pub fn drag_to(&mut self, x: f32, y: f32) {
        let Some(drag) = self.drag else { return };
        let (nx, ny) = drag.position(x, y);
        self.stack.set_transform(
            drag.layer,
            TransformUpdate {
                x: Some(nx),
                y: Some(ny),
                ..Default::default()
            },
        );
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    // ------------------------------------------------------------------------
    // Template and caption
    // ------------------------------------------------------------------------

    /// Activates a stencil by catalog name, loading its image.
    pub fn set_template(&mut self, name: &str, keep_inside: bool) -> Result<()> {
        let source = self
            .catalog
            .resolve(name)
            .ok_or_else(|| Error::ImageLoad(format!("unknown template '{name}'")))?;
        let stencil = io::load_bitmap(source)?;
        self.template = Some(TemplateStencil::new(name, stencil, keep_inside));
        Ok(())
    }

    pub fn clear_template(&mut self) {
        self.template = None;
    }

    pub fn template(&self) -> Option<&TemplateStencil> {
        self.template.as_ref()
    }

    pub fn set_caption(&mut self, text: Option<String>) {
        self.caption_text = text.filter(|t| !t.trim().is_empty());
    }

    pub fn set_caption_font(&mut self, font: FontArc) {
        self.caption_font = Some(font);
    }

    fn caption(&self) -> Option<Caption> {
        match (&self.caption_text, &self.caption_font) {
            (Some(text), Some(font)) => Some(Caption::new(text.clone(), font.clone())),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    /// Renders and packages the shareable mockup.
    pub fn export_mockup(&self, preview: PreviewMetrics, width: u32) -> Result<ExportArtifact> {
        let rendered = export::render_mockup(
            &self.product,
            self.stack.layers(),
            self.template.as_ref(),
            self.caption().as_ref(),
            preview,
            width,
        )?;
        export::package(&rendered, &self.product)
    }

    /// Renders and packages the production print file.
    pub fn export_print_file(
        &self,
        preview: PreviewMetrics,
        width: u32,
        height: u32,
    ) -> Result<ExportArtifact> {
        let rendered = export::render_print_file(
            &self.product,
            self.stack.layers(),
            self.template.as_ref(),
            self.caption().as_ref(),
            preview,
            width,
            height,
        )?;
        export::package(&rendered, &self.product)
    }
}

// ============================================================================
// Profiles
// ============================================================================

impl Configurable for DesignStudio {
    fn apply_profile(&mut self, profile: &DesignProfile) -> Result<()> {
        // Build the whole session into locals first; a load failure on any
        // source must leave the current session untouched.
        let mut stack = LayerStack::new();
        let mut sources = HashMap::new();
        for settings in &profile.layers {
            let source = ImageSource::from_str_ref(&settings.source);
            let bitmap = io::load_bitmap(&source)?;
            let id = stack.add_layer(bitmap, settings.label.clone());
            sources.insert(id, settings.source.clone());
            stack.set_transform(
                id,
                TransformUpdate {
                    x: Some(settings.x),
                    y: Some(settings.y),
                    scale: Some(settings.scale),
                    rotation: Some(settings.rotation),
                },
            );
            if let Some(remove_bg) = &settings.remove_bg {
                stack.set_remove_bg(id, Some(remove_bg.config.clone()));
                if let Some(layer) = stack.get_mut(id) {
                    layer.remove_bg_enabled = remove_bg.enabled;
                    // Restoring a session is not interactive; no debounce.
                    layer.ensure_processed();
                }
            }
        }

        let template = match &profile.template {
            Some(settings) => {
                let source = self.catalog.resolve(&settings.name).ok_or_else(|| {
                    Error::ImageLoad(format!("unknown template '{}'", settings.name))
                })?;
                let stencil = io::load_bitmap(source)?;
                Some(TemplateStencil::new(
                    settings.name.clone(),
                    stencil,
                    settings.keep_inside,
                ))
            }
            None => None,
        };

        self.stack = stack;
        self.sources = sources;
        self.template = template;
        self.debouncers.clear();
        self.selected = None;
        self.drag = None;
        self.set_caption(profile.caption.clone());

        info!(layers = profile.layers.len(), "profile applied");
        Ok(())
    }

    fn export_profile(&self) -> DesignProfile {
        let layers = self
            .stack
            .layers()
            .iter()
            .map(|layer| {
                let source = self.sources.get(&layer.id()).cloned().unwrap_or_default();
                LayerSettings {
                    source,
                    label: layer.label.clone(),
                    x: layer.x,
                    y: layer.y,
                    scale: layer.scale,
                    rotation: layer.rotation,
                    remove_bg: layer.remove_bg.clone().map(|config| RemoveBgSettings {
                        config,
                        enabled: layer.remove_bg_enabled,
                    }),
                }
            })
            .collect();

        DesignProfile {
            layers,
            template: self.template.as_ref().map(|t| TemplateSettings {
                name: t.name.clone(),
                keep_inside: t.keep_inside,
            }),
            caption: self.caption_text.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
