//! Ordered artwork layers with transforms and per-layer processing.
//!
//! Render (z) order is array order: later entries draw on top. All
//! bitmaps are owned values, so no operation here can alias a shared
//! pixel buffer.
//!
//! Each layer optionally carries a background-removal config plus a
//! cached processed bitmap keyed by the config's signature. Reprocessing
//! is debounce-guarded: slider drags mark the layer dirty, and the host
//! loop polls [`Debouncer`] so only the last pending change actually runs
//! the full-image keyer.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::bitmap::Bitmap;
use crate::chroma::{self, ChromaKeyConfig};

/// Position offset applied to duplicated layers, in preview pixels.
const DUPLICATE_OFFSET: f32 = 20.0;
/// Hit-test boxes span this fraction of the preview's width/height.
const HIT_BOX_FRACTION: f32 = 0.2;
/// Delay before a pending remove-bg change is reprocessed.
const REPROCESS_DELAY: Duration = Duration::from_millis(60);

// ============================================================================
// ArtLayer
// ============================================================================

/// Opaque layer identity, unique within one [`LayerStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(u64);

/// A placed, transformable artwork instance.
///
/// `x`/`y` are the layer's center point in preview pixels, measured as an
/// offset from the print-area center; `(0, 0)` is dead center. `scale`
/// 1.0 draws the layer at the full print-area height.
#[derive(Debug, Clone)]
pub struct ArtLayer {
    id: LayerId,
    /// Display name, also used for export filenames.
    pub label: String,
    /// The original decoded artwork. Never modified.
    pub bitmap: Bitmap,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    /// Rotation in degrees, clockwise.
    pub rotation: f32,
    /// Background-removal policy. Empty `keys` means "estimate the
    /// background from the image corners automatically".
    pub remove_bg: Option<ChromaKeyConfig>,
    /// Toggles removal without losing the config.
    pub remove_bg_enabled: bool,
    /// Result of a manual mask-editing session, if any.
    pub edited: Option<Bitmap>,
    processed: Option<Bitmap>,
    cache_key: Option<String>,
}

impl ArtLayer {
    fn new(id: LayerId, bitmap: Bitmap, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            bitmap,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            remove_bg: None,
            remove_bg_enabled: true,
            edited: None,
            processed: None,
            cache_key: None,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// The bitmap the compositor should draw: manual edit beats the
    /// auto-processed result beats the original.
    pub fn effective_bitmap(&self) -> &Bitmap {
        if let Some(edited) = &self.edited {
            return edited;
        }
        if self.remove_bg_enabled {
            if let Some(processed) = &self.processed {
                return processed;
            }
        }
        &self.bitmap
    }

    pub fn processed(&self) -> Option<&Bitmap> {
        self.processed.as_ref()
    }

    /// Runs background removal if the cached result is stale.
    ///
    /// Returns true when the keyer actually ran. A config with no key
    /// colors goes through corner-sampling estimation instead of a direct
    /// key.
    pub fn ensure_processed(&mut self) -> bool {
        let Some(config) = self.remove_bg.clone() else {
            self.processed = None;
            self.cache_key = None;
            return false;
        };
        if !self.remove_bg_enabled {
            return false;
        }
        let signature = config.signature();
        if self.cache_key.as_deref() == Some(signature.as_str()) {
            return false;
        }

        debug!(layer = %self.label, %signature, "reprocessing background removal");
        let result = if config.keys.is_empty() {
            chroma::auto_key(
                &self.bitmap,
                config.tolerance,
                config.feather,
                config.protect_dark,
            )
        } else {
            chroma::chroma_key(&self.bitmap, &config)
        };
        self.processed = Some(result);
        self.cache_key = Some(signature);
        true
    }
}

/// Partial transform update; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub scale: Option<f32>,
    pub rotation: Option<f32>,
}

// ============================================================================
// LayerStack
// ============================================================================

/// The ordered layer list plus id allocation.
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<ArtLayer>,
    next_id: u64,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[ArtLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, id: LayerId) -> Option<&ArtLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut ArtLayer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// Appends a new top-most layer and returns its id.
    pub fn add_layer(&mut self, bitmap: Bitmap, label: impl Into<String>) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.push(ArtLayer::new(id, bitmap, label));
        id
    }

    /// Clones a layer with a fresh id and a small position offset so the
    /// copy is visibly distinct. Returns the new id.
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let source = self.get(id)?.clone();
        let new_id = LayerId(self.next_id);
        self.next_id += 1;
        let mut copy = source;
        copy.id = new_id;
        copy.x += DUPLICATE_OFFSET;
        copy.y += DUPLICATE_OFFSET;
        self.layers.push(copy);
        Some(new_id)
    }

    /// Removes a layer. Returns whether it existed.
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(idx) => {
                self.layers.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Swaps the layer one step toward the top (later in draw order).
    /// No-op at the top of the stack; returns whether anything moved.
    pub fn move_up(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(idx) if idx + 1 < self.layers.len() => {
                self.layers.swap(idx, idx + 1);
                true
            }
            _ => false,
        }
    }

    /// Swaps the layer one step toward the bottom. No-op at the bottom.
    pub fn move_down(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(idx) if idx > 0 => {
                self.layers.swap(idx, idx - 1);
                true
            }
            _ => false,
        }
    }

    /// Applies a partial transform update. Returns whether the layer
    /// exists.
    pub fn set_transform(&mut self, id: LayerId, update: TransformUpdate) -> bool {
        let Some(layer) = self.get_mut(id) else {
            return false;
        };
        if let Some(x) = update.x {
            layer.x = x;
        }
        if let Some(y) = update.y {
            layer.y = y;
        }
        if let Some(scale) = update.scale {
            layer.scale = scale.max(0.0);
        }
        if let Some(rotation) = update.rotation {
            layer.rotation = rotation;
        }
        true
    }

    /// Replaces the layer's background-removal config. Changing the
    /// config invalidates any manual edit, matching the processed >
    /// original precedence the editor was started from.
    pub fn set_remove_bg(&mut self, id: LayerId, config: Option<ChromaKeyConfig>) -> bool {
        let Some(layer) = self.get_mut(id) else {
            return false;
        };
        if layer.remove_bg != config {
            layer.edited = None;
            layer.cache_key = None;
            layer.processed = None;
        }
        layer.remove_bg = config;
        true
    }

    /// Finds the top-most layer whose generous bounding box contains the
    /// cursor. Boxes span 20% of the preview in each dimension — layers
    /// share one canvas, so pixel-exact alpha hit-testing isn't possible
    /// and a forgiving box beats missed grabs.
    pub fn hit_test(&self, x: f32, y: f32, preview_w: f32, preview_h: f32) -> Option<LayerId> {
        let half_w = preview_w * HIT_BOX_FRACTION / 2.0;
        let half_h = preview_h * HIT_BOX_FRACTION / 2.0;
        self.layers
            .iter()
            .rev()
            .find(|layer| (x - layer.x).abs() <= half_w && (y - layer.y).abs() <= half_h)
            .map(|layer| layer.id)
    }
}

// ============================================================================
// DragSession
// ============================================================================

/// An in-flight pointer drag.
///
/// Positions are computed as `origin + (cursor - start)`, never by
/// accumulating per-event deltas, so a long drag cannot drift.
#[derive(Debug, Clone, Copy)]
pub struct DragSession {
    pub layer: LayerId,
    start_cursor: (f32, f32),
    origin: (f32, f32),
}

impl DragSession {
    /// Captures the cursor and the layer's position at pointer-down.
    pub fn begin(layer: &ArtLayer, cursor_x: f32, cursor_y: f32) -> Self {
        Self {
            layer: layer.id(),
            start_cursor: (cursor_x, cursor_y),
            origin: (layer.x, layer.y),
        }
    }

    /// The layer position for the current cursor location.
    pub fn position(&self, cursor_x: f32, cursor_y: f32) -> (f32, f32) {
        (
            self.origin.0 + (cursor_x - self.start_cursor.0),
            self.origin.1 + (cursor_y - self.start_cursor.1),
        )
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Deadline-based debounce guard for reprocessing.
///
/// Every change pushes the deadline out; only once the deadline passes
/// does [`take_ready`](Self::take_ready) fire, so a burst of slider
/// events runs the keyer once.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(REPROCESS_DELAY)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Records a change at `now`, resetting the deadline.
    pub fn mark(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once per elapsed deadline; clears the pending state.
    pub fn take_ready(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(color: [u8; 4]) -> Bitmap {
        Bitmap::from_pixel(8, 8, color)
    }

    fn stack_of(n: usize) -> (LayerStack, Vec<LayerId>) {
        let mut stack = LayerStack::new();
        let ids = (0..n)
            .map(|i| stack.add_layer(dot([i as u8, 0, 0, 255]), format!("layer {i}")))
            .collect();
        (stack, ids)
    }

    #[test]
    fn duplicate_offsets_position_and_keeps_transform() {
        let (mut stack, ids) = stack_of(1);
        stack.set_transform(
            ids[0],
            TransformUpdate {
                x: Some(100.0),
                y: Some(100.0),
                scale: Some(1.4),
                rotation: Some(30.0),
            },
        );

        let copy_id = stack.duplicate_layer(ids[0]).unwrap();
        assert_ne!(copy_id, ids[0]);

        let copy = stack.get(copy_id).unwrap();
        assert_eq!((copy.x, copy.y), (120.0, 120.0));
        assert_eq!(copy.scale, 1.4);
        assert_eq!(copy.rotation, 30.0);
        assert_eq!(copy.bitmap, stack.get(ids[0]).unwrap().bitmap);
    }

    #[test]
    fn reorder_no_ops_at_bounds() {
        let (mut stack, ids) = stack_of(3);
        let order = |s: &LayerStack| s.layers().iter().map(|l| l.id()).collect::<Vec<_>>();

        // Top layer cannot move further up, bottom cannot move down.
        assert!(!stack.move_up(ids[2]));
        assert!(!stack.move_down(ids[0]));
        assert_eq!(order(&stack), ids);

        assert!(stack.move_up(ids[0]));
        assert_eq!(order(&stack), vec![ids[1], ids[0], ids[2]]);
        assert!(stack.move_down(ids[2]));
        assert_eq!(order(&stack), vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn remove_layer_reports_existence() {
        let (mut stack, ids) = stack_of(2);
        assert!(stack.remove_layer(ids[0]));
        assert!(!stack.remove_layer(ids[0]));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn hit_test_prefers_top_most() {
        let (mut stack, ids) = stack_of(2);
        // Both layers centered at the same point; the later (top) one wins.
        stack.set_transform(ids[0], TransformUpdate { x: Some(50.0), y: Some(50.0), ..Default::default() });
        stack.set_transform(ids[1], TransformUpdate { x: Some(50.0), y: Some(50.0), ..Default::default() });

        assert_eq!(stack.hit_test(50.0, 50.0, 500.0, 500.0), Some(ids[1]));
        // 20% of 500 = 100px box, so 49px away still hits; 51px misses.
        assert_eq!(stack.hit_test(99.0, 50.0, 500.0, 500.0), Some(ids[1]));
        assert_eq!(stack.hit_test(101.0, 50.0, 500.0, 500.0), None);
    }

    #[test]
    fn drag_uses_origin_plus_delta() {
        let (mut stack, ids) = stack_of(1);
        stack.set_transform(ids[0], TransformUpdate { x: Some(10.0), y: Some(20.0), ..Default::default() });
        let drag = DragSession::begin(stack.get(ids[0]).unwrap(), 200.0, 200.0);

        // Wandering cursor path; only the final position matters.
        assert_eq!(drag.position(210.0, 195.0), (20.0, 15.0));
        assert_eq!(drag.position(203.0, 207.0), (13.0, 27.0));
        // Returning to the start restores the origin exactly (no drift).
        assert_eq!(drag.position(200.0, 200.0), (10.0, 20.0));
    }

    #[test]
    fn processed_cache_keyed_by_signature() {
        let (mut stack, ids) = stack_of(1);
        let config = ChromaKeyConfig::single([0, 0, 0], 0.3, 0.1);
        stack.set_remove_bg(ids[0], Some(config.clone()));

        let layer = stack.get_mut(ids[0]).unwrap();
        assert!(layer.ensure_processed(), "first run computes");
        assert!(!layer.ensure_processed(), "same signature hits the cache");

        stack.set_remove_bg(ids[0], Some(ChromaKeyConfig::single([0, 0, 0], 0.5, 0.1)));
        assert!(
            stack.get_mut(ids[0]).unwrap().ensure_processed(),
            "changed tolerance recomputes"
        );
    }

    #[test]
    fn disable_keeps_config_and_falls_back_to_original() {
        let (mut stack, ids) = stack_of(1);
        stack.set_remove_bg(ids[0], Some(ChromaKeyConfig::single([1, 2, 3], 0.3, 0.0)));
        let layer = stack.get_mut(ids[0]).unwrap();
        layer.ensure_processed();
        assert!(layer.processed().is_some());

        layer.remove_bg_enabled = false;
        assert_eq!(layer.effective_bitmap(), &layer.bitmap);
        assert!(layer.remove_bg.is_some(), "config survives the toggle");

        layer.remove_bg_enabled = true;
        assert_eq!(layer.effective_bitmap(), layer.processed.as_ref().unwrap());
    }

    #[test]
    fn manual_edit_takes_precedence() {
        let (mut stack, ids) = stack_of(1);
        let layer = stack.get_mut(ids[0]).unwrap();
        let edited = Bitmap::from_pixel(8, 8, [9, 9, 9, 9]);
        layer.edited = Some(edited.clone());
        assert_eq!(layer.effective_bitmap(), &edited);
    }

    #[test]
    fn debouncer_runs_only_last_pending_job() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(60));

        debouncer.mark(t0);
        // A second change 30ms in pushes the deadline out.
        debouncer.mark(t0 + Duration::from_millis(30));
        assert!(!debouncer.take_ready(t0 + Duration::from_millis(70)));
        assert!(debouncer.take_ready(t0 + Duration::from_millis(95)));
        // Fires once, then stays quiet until the next mark.
        assert!(!debouncer.take_ready(t0 + Duration::from_millis(200)));
    }
}
