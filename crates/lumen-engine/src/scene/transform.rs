//! World-transform derivation.
//!
//! World transforms are never cached; each query walks the ancestor chain,
//! so results always reflect the current tree (O(depth)).
//!
//! - world position = parent world position + local position × pixels-per-unit
//! - world rotation = sum of rotations along the chain
//! - world scale    = product of scales along the chain

use crate::coords::{model_matrix, Mat4, Rect, Vec2};
use crate::error::{EngineError, Result};

use super::{NodeId, Scene};

/// Composed transform of a node in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WorldTransform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl WorldTransform {
    pub const IDENTITY: WorldTransform = WorldTransform {
        position: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::ONE,
    };

    /// Axis-aligned box centered at the position, sized by the scale.
    ///
    /// Rotation is ignored.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.position, self.scale)
    }

    /// Model matrix mapping the unit quad `[-0.5, 0.5]²` into world space.
    #[inline]
    pub fn model_matrix(&self) -> Mat4 {
        model_matrix(self.position, self.rotation, self.scale)
    }
}

/// Composes the full world transform of `id` in one ancestor walk.
pub fn world_transform(scene: &Scene, id: NodeId) -> Result<WorldTransform> {
    let mut out = WorldTransform::IDENTITY;
    let mut cursor = Some(id);

    while let Some(current) = cursor {
        let node = scene.node(current).ok_or(EngineError::NodeNotFound(current))?;
        out.position += node.position * node.pixels_per_unit;
        out.rotation += node.rotation;
        out.scale = out.scale.mul_components(node.scale);
        cursor = node.parent();
    }

    Ok(out)
}

pub fn world_position(scene: &Scene, id: NodeId) -> Result<Vec2> {
    world_transform(scene, id).map(|t| t.position)
}

pub fn world_rotation(scene: &Scene, id: NodeId) -> Result<f32> {
    world_transform(scene, id).map(|t| t.rotation)
}

pub fn world_scale(scene: &Scene, id: NodeId) -> Result<Vec2> {
    world_transform(scene, id).map(|t| t.scale)
}

pub fn world_bounds(scene: &Scene, id: NodeId) -> Result<Rect> {
    world_transform(scene, id).map(|t| t.bounds())
}
