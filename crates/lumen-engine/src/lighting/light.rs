use serde::{Deserialize, Serialize};

use crate::coords::{ColorRgba, Mat4};
use crate::render::TextureHandle;
use crate::scene::WorldTransform;

use super::BlendMode;

/// Falloff radius of point lights, in world units.
pub const DEFAULT_POINT_RADIUS: f32 = 2.0;

/// Light parameters shared by global and point lights.
///
/// An intensity of 0 makes the light inactive.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Light {
    pub color: ColorRgba,
    pub intensity: f32,
    pub blend_mode: BlendMode,
}

impl Light {
    pub fn new(color: ColorRgba, intensity: f32, blend_mode: BlendMode) -> Self {
        Self {
            color,
            intensity: intensity.max(0.0),
            blend_mode,
        }
    }

    /// The padding light: contributes nothing.
    pub const fn inert() -> Self {
        Self {
            color: ColorRgba::WHITE,
            intensity: 0.0,
            blend_mode: BlendMode::Add,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.intensity > 0.0
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            color: ColorRgba::WHITE,
            intensity: 1.0,
            blend_mode: BlendMode::Add,
        }
    }
}

/// Light with a position, a distance falloff and an optional mask texture.
///
/// The mask is projected through the light's inverse model matrix: the
/// light's world box maps to UV `[0, 1]²`, scaled by `texture_scale` around
/// the center.
#[derive(Debug, Clone)]
pub struct PointLight {
    pub light: Light,
    pub texture: Option<TextureHandle>,
    /// Source of `texture`, kept for serialization.
    pub texture_url: Option<String>,
    pub texture_scale: f32,
    pub radius: f32,
}

impl PointLight {
    pub fn new(light: Light) -> Self {
        Self {
            light,
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture_url = texture.url().map(str::to_owned);
        self.texture = Some(texture);
        self
    }

    pub fn model_matrix(&self, world: &WorldTransform) -> Mat4 {
        world.model_matrix()
    }

    /// World → light-local transform. Degenerate scales yield a zero matrix
    /// so the mask samples its center.
    pub fn inverse_model_matrix(&self, world: &WorldTransform) -> Mat4 {
        let m = self.model_matrix(world);
        if m.determinant() == 0.0 {
            Mat4::ZERO
        } else {
            m.inverse()
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            light: Light::default(),
            texture: None,
            texture_url: None,
            texture_scale: 1.0,
            radius: DEFAULT_POINT_RADIUS,
        }
    }
}
