//! Manual mask editing with a soft circular brush.
//!
//! A [`Mask`] is a single-channel opacity buffer over a base bitmap:
//! 255 = fully visible, 0 = fully erased. The base bitmap is never
//! touched; the live preview is always `base RGB, alpha = base alpha x
//! mask / 255`, so a restore stroke brings erased detail back exactly
//! from the pristine pixels.
//!
//! Dabs accumulate additively with saturation (erase subtracts brush
//! weight, restore adds it back), which makes an erase/restore pass over
//! the same path a perfect round trip.
//!
//! History granularity is the gesture: one snapshot per completed stroke,
//! pushed on [`MaskEditor::end_stroke`], never mid-drag.

use crate::bitmap::Bitmap;

/// Maximum number of history snapshots kept per editing session. The
/// initial all-opaque snapshot is never evicted.
const HISTORY_CAP: usize = 50;

// ============================================================================
// Mask
// ============================================================================

/// A single-channel opacity buffer matching its base bitmap's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// Creates a fully opaque mask (nothing erased).
    pub fn new_opaque(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![255; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at a pixel, 0..=255.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    fn apply_dab(&mut self, cx: f32, cy: f32, brush: &Brush, mode: BrushMode) {
        let radius = brush.diameter / 2.0;
        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = ((cx + radius).ceil() as u32).min(self.width.saturating_sub(1));
        let max_y = ((cy + radius).ceil() as u32).min(self.height.saturating_sub(1));
        if self.width == 0 || self.height == 0 {
            return;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let weight = brush.weight_at((dx * dx + dy * dy).sqrt());
                if weight <= 0.0 {
                    continue;
                }
                let amount = (weight * 255.0).round() as u8;
                let idx = y as usize * self.width as usize + x as usize;
                self.data[idx] = match mode {
                    BrushMode::Erase => self.data[idx].saturating_sub(amount),
                    BrushMode::Restore => self.data[idx].saturating_add(amount),
                };
            }
        }
    }
}

// ============================================================================
// Brush
// ============================================================================

/// Painting direction for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushMode {
    /// Reduce mask opacity under the stamp.
    Erase,
    /// Raise mask opacity back toward the pristine base.
    Restore,
}

/// A soft circular brush.
///
/// Full strength inside `radius x hardness`, fading linearly to zero at
/// the outer radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Stamp diameter in pixels.
    pub diameter: f32,
    /// Inner-radius fraction in [0, 1]. 1.0 is a hard-edged stamp.
    pub hardness: f32,
}

impl Brush {
    pub fn new(diameter: f32, hardness: f32) -> Self {
        Self {
            diameter: diameter.max(1.0),
            hardness: hardness.clamp(0.0, 1.0),
        }
    }

    /// Stamp weight at `dist` pixels from the center, in [0, 1].
    fn weight_at(&self, dist: f32) -> f32 {
        let radius = self.diameter / 2.0;
        if dist >= radius {
            return 0.0;
        }
        let inner = radius * self.hardness;
        if dist <= inner {
            1.0
        } else {
            1.0 - (dist - inner) / (radius - inner)
        }
    }
}

// ============================================================================
// MaskEditor
// ============================================================================

/// A brush-based mask editing session over one base bitmap.
///
/// The session is a small state machine: idle → painting (between
/// [`begin_stroke`](Self::begin_stroke) and
/// [`end_stroke`](Self::end_stroke)) → idle. Undo/redo are rejected while
/// a stroke is in flight.
pub struct MaskEditor {
    base: Bitmap,
    mask: Mask,
    brush: Brush,
    mode: BrushMode,
    history: Vec<Mask>,
    cursor: usize,
    /// Last stamp position of the in-flight stroke, if painting.
    stroke_anchor: Option<(f32, f32)>,
}

impl MaskEditor {
    /// Starts a session with a fully opaque mask over `base`.
    pub fn new(base: Bitmap) -> Self {
        let mask = Mask::new_opaque(base.width(), base.height());
        Self {
            history: vec![mask.clone()],
            cursor: 0,
            base,
            mask,
            brush: Brush::new(40.0, 0.5),
            mode: BrushMode::Erase,
            stroke_anchor: None,
        }
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    pub fn set_mode(&mut self, mode: BrushMode) {
        self.mode = mode;
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn is_painting(&self) -> bool {
        self.stroke_anchor.is_some()
    }

    /// Pointer-down: stamps once and arms stroke interpolation.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        self.mask.apply_dab(x, y, &self.brush, self.mode);
        self.stroke_anchor = Some((x, y));
    }

    /// Pointer-move: stamps at evenly spaced intervals from the previous
    /// position so fast drags leave no gaps.
    pub fn stroke_to(&mut self, x: f32, y: f32) {
        let Some((px, py)) = self.stroke_anchor else {
            return;
        };
        let dist = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
        let spacing = self.brush.diameter / 4.0;
        let steps = (dist / spacing).ceil().max(1.0) as u32;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let sx = px + (x - px) * t;
            let sy = py + (y - py) * t;
            self.mask.apply_dab(sx, sy, &self.brush, self.mode);
        }
        self.stroke_anchor = Some((x, y));
    }

    /// Pointer-up: closes the gesture and pushes one history snapshot.
    pub fn end_stroke(&mut self) {
        if self.stroke_anchor.take().is_none() {
            return;
        }
        // A new stroke invalidates any redo tail.
        self.history.truncate(self.cursor + 1);
        self.history.push(self.mask.clone());
        self.cursor += 1;
        // Evict the oldest non-initial snapshot once over the cap.
        if self.history.len() > HISTORY_CAP {
            self.history.remove(1);
            self.cursor -= 1;
        }
    }

    /// Steps back one completed stroke. No-op at the initial snapshot or
    /// while painting. Returns whether anything changed.
    pub fn undo(&mut self) -> bool {
        if self.is_painting() || self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.mask = self.history[self.cursor].clone();
        true
    }

    /// Re-applies one undone stroke. Returns whether anything changed.
    pub fn redo(&mut self) -> bool {
        if self.is_painting() || self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.cursor += 1;
        self.mask = self.history[self.cursor].clone();
        true
    }

    /// The authoritative live preview: base RGB with alpha scaled by the
    /// mask. Restoring to full mask opacity reproduces the base exactly.
    pub fn composite(&self) -> Bitmap {
        let mut out = self.base.clone();
        let width = out.width() as usize;
        for (i, pixel) in out.pixels_mut().pixels_mut().enumerate() {
            let x = (i % width) as u32;
            let y = (i / width) as u32;
            let m = self.mask.get(x, y) as u16;
            pixel.0[3] = ((pixel.0[3] as u16 * m) / 255) as u8;
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
