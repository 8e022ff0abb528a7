//! Serializable design document.
//!
//! A [`DesignProfile`] captures everything needed to restore an authoring
//! session except the pixel data itself: layer sources (as string
//! references), transforms, background-removal settings, the active
//! template, and the caption. It serializes to camelCase JSON for
//! frontend/backend round trips.
//!
//! # Example
//!
//! ```
//! use merch_studio::{DesignProfile, LayerSettings};
//!
//! let profile = DesignProfile::new()
//!     .with_layer(LayerSettings::new("https://cdn.example.com/ape.png", "Ape #42"))
//!     .with_caption("gm");
//!
//! let json = profile.to_json().unwrap();
//! let restored = DesignProfile::from_json(&json).unwrap();
//! assert_eq!(restored.layers.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::chroma::ChromaKeyConfig;

// ============================================================================
// Layer settings
// ============================================================================

/// Serializable background-removal settings for one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBgSettings {
    #[serde(flatten)]
    pub config: ChromaKeyConfig,

    /// Whether removal is currently enabled (config survives toggling).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Serializable state of one artwork layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSettings {
    /// Image reference: URL, data URL, or path.
    pub source: String,
    pub label: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_bg: Option<RemoveBgSettings>,
}

impl LayerSettings {
    pub fn new(source: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            remove_bg: None,
        }
    }
}

/// Serializable template selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSettings {
    /// Catalog name, e.g. `"skateboard"`.
    pub name: String,
    #[serde(default = "default_true")]
    pub keep_inside: bool,
}

// ============================================================================
// DesignProfile
// ============================================================================

/// The full serializable authoring state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignProfile {
    /// Bottom-to-top layer order, matching draw order.
    #[serde(default)]
    pub layers: Vec<LayerSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl DesignProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: LayerSettings) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_template(mut self, template: TemplateSettings) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Serializes to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_true() -> bool {
    true
}

fn default_scale() -> f32 {
    1.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_json_round_trip() {
        let mut layer = LayerSettings::new("https://cdn.example.com/a.png", "Ape #42");
        layer.x = 12.5;
        layer.rotation = -15.0;
        layer.remove_bg = Some(RemoveBgSettings {
            config: ChromaKeyConfig::single([135, 206, 235], 0.4, 0.1).with_protect_dark(true),
            enabled: true,
        });

        let profile = DesignProfile::new()
            .with_layer(layer)
            .with_template(TemplateSettings {
                name: "skateboard".into(),
                keep_inside: true,
            })
            .with_caption("gm frens");

        let json = profile.to_json().unwrap();
        let restored = DesignProfile::from_json(&json).unwrap();

        assert_eq!(restored.layers.len(), 1);
        let layer = &restored.layers[0];
        assert_eq!(layer.label, "Ape #42");
        assert_eq!(layer.x, 12.5);
        assert_eq!(layer.rotation, -15.0);
        let bg = layer.remove_bg.as_ref().unwrap();
        assert!(bg.enabled);
        assert!(bg.config.protect_dark);
        assert_eq!(bg.config.keys, vec![[135, 206, 235]]);
        assert_eq!(restored.template.as_ref().unwrap().name, "skateboard");
        assert_eq!(restored.caption.as_deref(), Some("gm frens"));
    }

    #[test]
    fn fields_are_camel_case() {
        let mut layer = LayerSettings::new("a.png", "a");
        layer.remove_bg = Some(RemoveBgSettings {
            config: ChromaKeyConfig::single([0, 0, 0], 0.1, 0.0).with_protect_dark(true),
            enabled: false,
        });
        let json = DesignProfile::new().with_layer(layer).to_json().unwrap();
        assert!(json.contains("\"removeBg\""), "{json}");
        assert!(json.contains("\"protectDark\""), "{json}");
        assert!(!json.contains("remove_bg"), "{json}");
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{"layers":[{"source":"a.png","label":"a"}]}"#;
        let profile = DesignProfile::from_json(json).unwrap();
        let layer = &profile.layers[0];
        assert_eq!(layer.scale, 1.0);
        assert_eq!(layer.x, 0.0);
        assert!(layer.remove_bg.is_none());
        assert!(profile.template.is_none());
    }
}
