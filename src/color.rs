//! Color-space utilities for chroma keying.
//!
//! RGB↔HSV conversion goes through `palette`; the distance metric on top
//! is hand-tuned for separating flat background colors from artwork.
//! The weights and the normalization divisor were calibrated against real
//! garment photos — do not retune them casually, segmentation quality
//! shifts in non-obvious ways.

use palette::{Hsv, IntoColor, Srgb};

/// Weight on the hue delta. Hue separates flat backgrounds best, so it
/// dominates the metric.
const HUE_WEIGHT: f32 = 2.1;
/// Weight on the saturation delta.
const SAT_WEIGHT: f32 = 1.0;
/// Weight on the value delta.
const VAL_WEIGHT: f32 = 0.35;
/// Empirical maximum of the weighted metric, used to normalize distances
/// into [0, 1].
const DISTANCE_NORMALIZER: f32 = 1.8;

/// An HSV color: hue in degrees [0, 360), saturation and value in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvColor {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

/// Converts an 8-bit RGB triple to HSV.
///
/// Achromatic inputs (saturation 0) report hue 0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> HsvColor {
    let rgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let hsv: Hsv = rgb.into_color();
    let hue = if hsv.saturation == 0.0 {
        0.0
    } else {
        hsv.hue.into_positive_degrees()
    };
    HsvColor {
        hue,
        saturation: hsv.saturation,
        value: hsv.value,
    }
}

/// Converts an HSV color back to an 8-bit RGB triple.
pub fn hsv_to_rgb(color: HsvColor) -> (u8, u8, u8) {
    let hsv: Hsv = Hsv::new(color.hue, color.saturation, color.value);
    let rgb: Srgb = hsv.into_color();
    (
        (rgb.red * 255.0).round().clamp(0.0, 255.0) as u8,
        (rgb.green * 255.0).round().clamp(0.0, 255.0) as u8,
        (rgb.blue * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}

/// Circular distance between two hues in degrees, always in [0, 180].
pub fn hue_distance(h1: f32, h2: f32) -> f32 {
    let d = (h1 - h2).abs() % 360.0;
    d.min(360.0 - d)
}

/// Raw weighted HSV distance between two colors.
///
/// `sqrt((2.1·Δh/180)² + (1.0·Δs)² + (0.35·Δv)²)` — hue weighted most
/// heavily. See module docs before touching the constants.
pub fn key_distance(a: HsvColor, b: HsvColor) -> f32 {
    let dh = HUE_WEIGHT * hue_distance(a.hue, b.hue) / 180.0;
    let ds = SAT_WEIGHT * (a.saturation - b.saturation);
    let dv = VAL_WEIGHT * (a.value - b.value);
    (dh * dh + ds * ds + dv * dv).sqrt()
}

/// [`key_distance`] divided by the empirical maximum, clamped to [0, 1].
///
/// This is the quantity tolerance and feather thresholds are expressed in.
pub fn normalized_key_distance(a: HsvColor, b: HsvColor) -> f32 {
    (key_distance(a, b) / DISTANCE_NORMALIZER).clamp(0.0, 1.0)
}
