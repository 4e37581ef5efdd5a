use core::fmt;

use crate::coords::ColorRgba;
use crate::error::GpuError;
use crate::lighting::{GlobalLightUniform, PointLightUniform, MAX_GLOBAL_LIGHTS, MAX_POINT_LIGHTS};

use super::UniformValue;

/// Backend handle of a compiled program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GpuProgram(pub u32);

/// Backend handle of an uploaded RGBA8 texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GpuTexture(pub u32);

impl fmt::Display for GpuProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program:{}", self.0)
    }
}

impl fmt::Display for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture:{}", self.0)
    }
}

/// Shader sources handed to [`GpuContext::compile`].
#[derive(Debug, Copy, Clone)]
pub struct ProgramSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Names of the program's custom uniforms, in binding-table order.
///
/// Built-in inputs (model matrix, source rect, tint, texture, camera and
/// lights) are implied by the sprite pipeline and not listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramLayout {
    pub uniforms: Vec<String>,
}

/// Values shared by every instance of one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub globals: [GlobalLightUniform; MAX_GLOBAL_LIGHTS],
    pub points: [PointLightUniform; MAX_POINT_LIGHTS],
    /// Mask texture per point slot; inert slots carry the blank texture.
    pub point_textures: [GpuTexture; MAX_POINT_LIGHTS],
    /// Resolved custom uniforms, same order as the program's layout.
    pub custom: Vec<(String, UniformValue)>,
}

/// Per-sprite draw data.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstanceUniforms {
    pub model: [[f32; 4]; 4],
    /// Normalized `[x, y, w, h]` sub-rectangle of the texture.
    pub source_rect: [f32; 4],
    pub tint: [f32; 4],
    pub texture: GpuTexture,
}

/// One colored world-space line, drawn over the sprites.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LineSegment {
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub color: [f32; 4],
}

/// GPU operations the engine needs.
///
/// Implementations may execute immediately or record and flush later; the
/// engine only requires that calls take effect in order.
pub trait GpuContext: Send {
    fn compile(
        &mut self,
        source: &ProgramSource<'_>,
        layout: &ProgramLayout,
    ) -> Result<GpuProgram, GpuError>;

    fn release_program(&mut self, program: GpuProgram);

    /// Uploads tightly packed RGBA8 pixels.
    fn upload_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<GpuTexture, GpuError>;

    fn release_texture(&mut self, texture: GpuTexture);

    fn clear(&mut self, color: ColorRgba, depth: f32);

    /// One instanced draw of `program`.
    fn issue_draw(
        &mut self,
        program: GpuProgram,
        frame: &FrameUniforms,
        instances: &[InstanceUniforms],
    ) -> Result<(), GpuError>;

    /// Unlit lines in world space, after every sprite draw of the frame.
    fn draw_lines(
        &mut self,
        view_projection: &[[f32; 4]; 4],
        segments: &[LineSegment],
    ) -> Result<(), GpuError>;
}

/// Checks that `pixels` holds exactly `width × height` RGBA8 texels.
pub fn validate_rgba8(pixels: &[u8], width: u32, height: u32) -> Result<(), GpuError> {
    let expected = (width as usize) * (height as usize) * 4;
    if width == 0 || height == 0 || pixels.len() != expected {
        return Err(GpuError::InvalidTextureData {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}
