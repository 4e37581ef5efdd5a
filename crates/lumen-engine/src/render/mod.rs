//! Sprite rendering.
//!
//! The [`Renderer`] turns a scene into instanced draws: sprites are culled
//! against the camera, sorted by z then traversal order, and grouped so each
//! distinct [`ShaderProgram`] costs exactly one draw call per frame.
//!
//! The GPU itself sits behind [`GpuContext`]. [`WgpuContext`] drives a real
//! device; [`HeadlessGpu`] records calls without one.

mod batch;
mod ctx;
mod gpu;
mod headless;
mod program;
mod renderer;
mod sprite;
mod texture;
mod wgpu_backend;

pub use batch::{collect_batches, Batch, CullStats};
pub use ctx::RenderTarget;
pub use gpu::{
    validate_rgba8,
    FrameUniforms,
    GpuContext,
    GpuProgram,
    GpuTexture,
    InstanceUniforms,
    LineSegment,
    ProgramLayout,
    ProgramSource,
};
pub use headless::{HeadlessGpu, RecordedDraw, RecordedLines, RecordedProgram};
pub use program::{
    ProgramId,
    ShaderProgram,
    UniformBinding,
    UniformContext,
    UniformValue,
    LINE_WGSL,
    SPRITE_FRAGMENT_WGSL,
    SPRITE_VERTEX_WGSL,
};
pub use renderer::{DrawCommand, FrameStats, Renderer};
pub use sprite::Sprite;
pub use texture::{decode_rgba8, FileFetcher, TextureCache, TextureFetcher, TextureHandle};
pub use wgpu_backend::WgpuContext;
