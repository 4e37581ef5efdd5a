use bytemuck::{Pod, Zeroable};

use crate::coords::{ColorRgba, Vec2};
use crate::error::Result;
use crate::render::TextureHandle;
use crate::scene::{transform, NodeKind, Scene};

use super::{BlendMode, Light, PointLight};

pub const MAX_GLOBAL_LIGHTS: usize = 2;
pub const MAX_POINT_LIGHTS: usize = 2;

/// GPU layout of a global light.
///
/// `params = [intensity, blend mode code, 0, 0]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GlobalLightUniform {
    pub color: [f32; 4],
    pub params: [f32; 4],
}

impl GlobalLightUniform {
    pub fn from_light(light: &Light) -> Self {
        Self {
            color: light.color.to_array(),
            params: [light.intensity, light.blend_mode.code() as f32, 0.0, 0.0],
        }
    }

    pub fn inert() -> Self {
        Self::from_light(&Light::inert())
    }

    #[inline]
    pub fn intensity(&self) -> f32 {
        self.params[0]
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        BlendMode::from_code(self.params[1] as u32).unwrap_or_default()
    }
}

/// GPU layout of a point light.
///
/// `params = [intensity, blend mode code, radius, texture scale]`,
/// `position = [world x, world y, 0, 0]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PointLightUniform {
    pub inverse_model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub params: [f32; 4],
    pub position: [f32; 4],
}

impl PointLightUniform {
    pub fn inert() -> Self {
        Self {
            inverse_model: glam::Mat4::IDENTITY.to_cols_array_2d(),
            color: ColorRgba::WHITE.to_array(),
            params: [0.0, BlendMode::Add.code() as f32, super::DEFAULT_POINT_RADIUS, 1.0],
            position: [0.0; 4],
        }
    }

    #[inline]
    pub fn intensity(&self) -> f32 {
        self.params[0]
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        BlendMode::from_code(self.params[1] as u32).unwrap_or_default()
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.params[2]
    }

    #[inline]
    pub fn texture_scale(&self) -> f32 {
        self.params[3]
    }
}

/// Lighting state bound for one frame. Every slot is always filled.
#[derive(Debug, Clone)]
pub struct LightingUniforms {
    pub globals: [GlobalLightUniform; MAX_GLOBAL_LIGHTS],
    pub points: [PointLightUniform; MAX_POINT_LIGHTS],
    /// Mask per point slot; `None` binds the blank white texture.
    pub point_masks: [Option<TextureHandle>; MAX_POINT_LIGHTS],
    pub active_globals: usize,
    pub active_points: usize,
}

impl LightingUniforms {
    pub fn inert() -> Self {
        Self {
            globals: [GlobalLightUniform::inert(); MAX_GLOBAL_LIGHTS],
            points: [PointLightUniform::inert(); MAX_POINT_LIGHTS],
            point_masks: [None, None],
            active_globals: 0,
            active_points: 0,
        }
    }
}

impl Default for LightingUniforms {
    fn default() -> Self {
        Self::inert()
    }
}

/// Picks the lights bound this frame.
///
/// The first active lights in traversal order win; a light is active when
/// its intensity is positive and it is visible (including ancestors).
pub fn gather_lights(scene: &Scene) -> Result<LightingUniforms> {
    let mut out = LightingUniforms::inert();

    for id in scene.traverse() {
        if !scene.is_visible(id) {
            continue;
        }
        let node = scene.get(id)?;
        match &node.kind {
            NodeKind::GlobalLight(light) if light.is_active() => {
                if out.active_globals < MAX_GLOBAL_LIGHTS {
                    out.globals[out.active_globals] = GlobalLightUniform::from_light(light);
                    out.active_globals += 1;
                }
            }
            NodeKind::PointLight(point) if point.light.is_active() => {
                if out.active_points < MAX_POINT_LIGHTS {
                    let world = transform::world_transform(scene, id)?;
                    let slot = out.active_points;
                    out.points[slot] = point_uniform(point, &world);
                    out.point_masks[slot] = point.texture.clone();
                    out.active_points += 1;
                }
            }
            _ => {}
        }

        if out.active_globals == MAX_GLOBAL_LIGHTS && out.active_points == MAX_POINT_LIGHTS {
            break;
        }
    }

    Ok(out)
}

fn point_uniform(point: &PointLight, world: &transform::WorldTransform) -> PointLightUniform {
    let l = &point.light;
    PointLightUniform {
        inverse_model: point.inverse_model_matrix(world).to_cols_array_2d(),
        color: l.color.to_array(),
        params: [l.intensity, l.blend_mode.code() as f32, point.radius, point.texture_scale],
        position: [world.position.x, world.position.y, 0.0, 0.0],
    }
}

/// Host-side mirror of the sprite fragment shader.
///
/// `sample_mask(slot, uv)` returns the mask texel of point light `slot`.
pub fn shade(
    texel: ColorRgba,
    tint: ColorRgba,
    world_pos: Vec2,
    lighting: &LightingUniforms,
    sample_mask: impl Fn(usize, Vec2) -> ColorRgba,
) -> ColorRgba {
    let base = [
        texel.r * tint.r,
        texel.g * tint.g,
        texel.b * tint.b,
        texel.a * tint.a,
    ];
    let mut rgb = [base[0], base[1], base[2]];

    for g in &lighting.globals {
        if g.intensity() == 0.0 {
            continue;
        }
        let light = [g.color[0], g.color[1], g.color[2]];
        rgb = g.blend_mode().apply(rgb, light, g.intensity());
    }

    for (slot, p) in lighting.points.iter().enumerate() {
        if p.intensity() == 0.0 || p.radius() <= 0.0 {
            continue;
        }

        let inv = glam::Mat4::from_cols_array_2d(&p.inverse_model);
        let local = inv.transform_point3(glam::Vec3::new(world_pos.x, world_pos.y, 0.0));
        let uv = Vec2::new(local.x, local.y) * p.texture_scale() + Vec2::splat(0.5);
        let mask = sample_mask(slot, uv);
        let light = [mask.r * p.color[0], mask.g * p.color[1], mask.b * p.color[2]];

        let dist = world_pos.distance(Vec2::new(p.position[0], p.position[1]));
        let amount = (1.0 - dist / p.radius()) * p.intensity();
        if amount <= 0.0 {
            continue;
        }
        rgb = p.blend_mode().apply(rgb, light, amount);
    }

    ColorRgba::new(rgb[0], rgb[1], rgb[2], base[3])
}
