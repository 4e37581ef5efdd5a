use serde::{Deserialize, Serialize};

use crate::coords::ColorRgba;
use crate::error::Result;
use crate::time::DEFAULT_FIXED_DELTA;

/// Engine tuning knobs.
///
/// Every field has a default, so a partial JSON document is valid:
///
/// ```
/// let cfg = lumen_engine::EngineConfig::from_json_str(r#"{ "zoom_max": 4.0 }"#).unwrap();
/// assert_eq!(cfg.zoom_max, 4.0);
/// assert_eq!(cfg.zoom_min, 0.1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds per fixed update step.
    pub fixed_delta: f64,
    pub clear_color: ColorRgba,
    /// Scale applied to local positions when composing world positions.
    pub default_pixels_per_unit: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    /// Zoom change per 100 wheel units.
    pub zoom_step: f32,
    /// Pixel distance within which a gizmo axis is grabbed.
    pub gizmo_threshold_px: f32,
    /// Length of each gizmo handle, in world units.
    pub gizmo_handle_length: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_delta: DEFAULT_FIXED_DELTA,
            clear_color: ColorRgba::BLACK,
            default_pixels_per_unit: 1.0,
            zoom_min: 0.1,
            zoom_max: 10.0,
            zoom_step: 0.1,
            gizmo_threshold_px: 10.0,
            gizmo_handle_length: 100.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
