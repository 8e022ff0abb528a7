//! Chroma-key segmentation and automatic background estimation.
//!
//! The keyer compares every pixel against one or more key colors in HSV
//! space and rewrites only the alpha channel: fully removed inside the
//! tolerance radius, feathered across the band above it, untouched
//! beyond. RGB is never modified, so a later "restore" brush can bring
//! erased detail back exactly.
//!
//! For sources with no usable alpha of their own, [`estimate_background`]
//! samples the four image corners to guess the flat background color and
//! [`auto_key`] wires the two together.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bitmap::Bitmap;
use crate::color::{self, HsvColor};

/// Pixels with saturation below this are too gray to key safely;
/// anti-aliased foreground edges live here.
const MIN_SATURATION: f32 = 0.22;
/// Pixels with value below this are too dark to key safely.
const MIN_VALUE: f32 = 0.33;
/// Dark-protection thresholds: likely foreground shadow, never keyed.
const PROTECT_VALUE: f32 = 0.22;
const PROTECT_SATURATION: f32 = 0.12;

/// Default corner patch edge length for background estimation.
pub const DEFAULT_PATCH_SIZE: u32 = 20;
/// Alpha above this counts as opaque for coverage and corner sampling.
const OPAQUE_ALPHA_THRESHOLD: u8 = 8;
/// Sources at or above this opaque coverage are treated as un-segmented
/// (flat background still present).
const AUTO_KEY_COVERAGE: f32 = 0.99;

// ============================================================================
// ChromaKeyConfig
// ============================================================================

/// Per-layer background-removal policy.
///
/// With more than one key color the engine uses the distance to the
/// *nearest* key. Tolerance and feather are normalized fractions of the
/// maximum key distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromaKeyConfig {
    /// Key colors as 8-bit RGB triples.
    pub keys: Vec<[u8; 3]>,
    /// Normalized tolerance in [0, 1]. Distances at or below it erase.
    pub tolerance: f32,
    /// Normalized feather width in [0, 1]. The soft band above tolerance.
    pub feather: f32,
    /// Skip near-black saturated pixels (likely foreground shadow).
    pub protect_dark: bool,
}

impl ChromaKeyConfig {
    /// Single-key policy. Tolerance and feather are clamped to [0, 1].
    pub fn single(key: [u8; 3], tolerance: f32, feather: f32) -> Self {
        Self {
            keys: vec![key],
            tolerance: tolerance.clamp(0.0, 1.0),
            feather: feather.clamp(0.0, 1.0),
            protect_dark: false,
        }
    }

    /// Multi-key policy; the nearest key decides each pixel.
    pub fn multi(keys: Vec<[u8; 3]>, tolerance: f32, feather: f32) -> Self {
        Self {
            keys,
            tolerance: tolerance.clamp(0.0, 1.0),
            feather: feather.clamp(0.0, 1.0),
            protect_dark: false,
        }
    }

    pub fn with_protect_dark(mut self, protect: bool) -> Self {
        self.protect_dark = protect;
        self
    }

    /// Stable signature for processed-bitmap caching. Two configs with the
    /// same signature produce byte-identical keyer output.
    pub fn signature(&self) -> String {
        let mut sig = format!(
            "t{:08x}f{:08x}d{}",
            self.tolerance.to_bits(),
            self.feather.to_bits(),
            self.protect_dark as u8
        );
        for key in &self.keys {
            sig.push_str(&format!("k{:02x}{:02x}{:02x}", key[0], key[1], key[2]));
        }
        sig
    }
}

// ============================================================================
// Keyer
// ============================================================================

/// Applies the chroma key to `source`, returning a new bitmap with the
/// same dimensions and RGB, and alpha rewritten per the config.
///
/// Deterministic: identical inputs produce byte-identical output.
pub fn chroma_key(source: &Bitmap, config: &ChromaKeyConfig) -> Bitmap {
    let tolerance = config.tolerance.clamp(0.0, 1.0);
    let feather = config.feather.clamp(0.0, 1.0);
    let keys: Vec<HsvColor> = config
        .keys
        .iter()
        .map(|k| color::rgb_to_hsv(k[0], k[1], k[2]))
        .collect();

    let mut out = source.clone();
    if keys.is_empty() {
        return out;
    }

    for pixel in out.pixels_mut().pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }

        let hsv = color::rgb_to_hsv(r, g, b);

        if config.protect_dark
            && hsv.value < PROTECT_VALUE
            && hsv.saturation > PROTECT_SATURATION
        {
            continue;
        }
        // Near-gray / near-dark pixels are ambiguous; keying them eats
        // anti-aliased foreground edges.
        if hsv.saturation < MIN_SATURATION || hsv.value < MIN_VALUE {
            continue;
        }

        let distance = keys
            .iter()
            .map(|key| color::normalized_key_distance(hsv, *key))
            .fold(f32::INFINITY, f32::min);

        if distance <= tolerance {
            pixel.0[3] = 0;
        } else if feather > 0.0 && distance <= tolerance + feather {
            // Linear ramp from 0 at the tolerance edge up to the original
            // alpha at the far edge of the feather band.
            let t = (distance - tolerance) / feather;
            pixel.0[3] = (a as f32 * t).round() as u8;
        }
    }

    out
}

// ============================================================================
// Corner-sampling estimator
// ============================================================================

/// Estimates the background color by averaging `patch x patch` squares at
/// the four image corners, then averaging the four corner means.
///
/// Only pixels that are actually opaque participate. Returns `None` when
/// no corner contains a single opaque pixel.
pub fn estimate_background(source: &Bitmap, patch: u32) -> Option<[u8; 3]> {
    let width = source.width();
    let height = source.height();
    if width == 0 || height == 0 {
        return None;
    }
    let patch = patch.max(1).min(width).min(height);

    let corners = [
        (0, 0),
        (width - patch, 0),
        (0, height - patch),
        (width - patch, height - patch),
    ];

    let mut sums = [0u64; 3];
    let mut corner_count = 0u64;
    for (cx, cy) in corners {
        let mut acc = [0u64; 3];
        let mut n = 0u64;
        for y in cy..cy + patch {
            for x in cx..cx + patch {
                let [r, g, b, a] = source.get(x, y);
                if a > OPAQUE_ALPHA_THRESHOLD {
                    acc[0] += r as u64;
                    acc[1] += g as u64;
                    acc[2] += b as u64;
                    n += 1;
                }
            }
        }
        if n > 0 {
            sums[0] += acc[0] / n;
            sums[1] += acc[1] / n;
            sums[2] += acc[2] / n;
            corner_count += 1;
        }
    }

    if corner_count == 0 {
        return None;
    }
    Some([
        (sums[0] / corner_count) as u8,
        (sums[1] / corner_count) as u8,
        (sums[2] / corner_count) as u8,
    ])
}

/// Automatic background removal for sources without their own alpha.
///
/// If the source is near-fully opaque, estimate the background from the
/// corners and key it out with the given tolerance/feather. Sources that
/// already carry substantial transparency are returned unchanged — they
/// have been segmented before.
pub fn auto_key(source: &Bitmap, tolerance: f32, feather: f32, protect_dark: bool) -> Bitmap {
    let coverage = source.opaque_fraction(OPAQUE_ALPHA_THRESHOLD);
    if coverage < AUTO_KEY_COVERAGE {
        debug!(coverage, "source already segmented, skipping auto key");
        return source.clone();
    }
    let Some(background) = estimate_background(source, DEFAULT_PATCH_SIZE) else {
        return source.clone();
    };
    debug!(
        r = background[0],
        g = background[1],
        b = background[2],
        "estimated background color from corners"
    );
    let config =
        ChromaKeyConfig::single(background, tolerance, feather).with_protect_dark(protect_dark);
    chroma_key(source, &config)
}

// ============================================================================
// Tests
// ============================================================================
