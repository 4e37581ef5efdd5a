use std::sync::Arc;

use crate::coords::{ColorRgba, Mat4, Rect};
use crate::scene::{WorldTransform, ZIndex};

use super::{InstanceUniforms, ProgramId, ShaderProgram, TextureHandle};

/// Textured quad node payload.
///
/// The quad spans the node's world scale, centered on its world position.
/// A sprite without a texture (not loaded yet, or failed) draws nothing.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub texture: Option<TextureHandle>,
    /// Where `texture` comes from; kept for serialization and reloading.
    pub texture_url: Option<String>,
    pub tint: ColorRgba,
    /// Normalized `[x, y, w, h]` region of the texture to draw.
    pub source_rect: Rect,
    pub z: ZIndex,
    pub program: Arc<ShaderProgram>,
}

impl Sprite {
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture_url: texture.url().map(str::to_owned),
            texture: Some(texture),
            ..Default::default()
        }
    }

    /// A sprite whose texture will be attached once `url` has loaded.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            texture_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_tint(mut self, tint: ColorRgba) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_source_rect(mut self, rect: Rect) -> Self {
        self.source_rect = rect;
        self
    }

    pub fn with_z(mut self, z: ZIndex) -> Self {
        self.z = z;
        self
    }

    pub fn with_program(mut self, program: Arc<ShaderProgram>) -> Self {
        self.program = program;
        self
    }

    #[inline]
    pub fn program_id(&self) -> ProgramId {
        self.program.id()
    }

    pub fn model_matrix(&self, world: &WorldTransform) -> Mat4 {
        world.model_matrix()
    }

    /// Draw data for this frame, or `None` while there is no texture.
    pub fn instance(&self, world: &WorldTransform) -> Option<InstanceUniforms> {
        let texture = self.texture.as_ref()?;
        Some(InstanceUniforms {
            model: self.model_matrix(world).to_cols_array_2d(),
            source_rect: self.source_rect.to_array(),
            tint: self.tint.to_array(),
            texture: texture.gpu(),
        })
    }
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            texture: None,
            texture_url: None,
            tint: ColorRgba::WHITE,
            source_rect: Rect::UNIT,
            z: ZIndex::default(),
            program: Arc::new(ShaderProgram::sprite()),
        }
    }
}
