use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::camera::CameraView;

use super::{ProgramLayout, ProgramSource};

/// Default sprite vertex stage (WGSL, entry point `vs_main`).
pub const SPRITE_VERTEX_WGSL: &str = include_str!("shaders/sprite_vert.wgsl");

/// Default sprite fragment stage (WGSL, entry point `fs_main`).
pub const SPRITE_FRAGMENT_WGSL: &str = include_str!("shaders/sprite_frag.wgsl");

/// Overlay line program (WGSL, entry points `vs_main` and `fs_main`).
pub const LINE_WGSL: &str = include_str!("shaders/line.wgsl");

/// Program identity: a hash of the vertex and fragment sources.
///
/// Byte-identical sources always produce the same id, so independently built
/// programs with the same code share one draw command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProgramId(pub u64);

impl ProgramId {
    pub fn from_sources(vertex: &str, fragment: &str) -> Self {
        let mut h = Xxh3::new();
        h.update(vertex.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart.
        h.update(&[0]);
        h.update(fragment.as_bytes());
        ProgramId(h.digest())
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Value of a custom uniform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

/// Inputs available to per-draw uniform accessors.
#[derive(Debug, Copy, Clone)]
pub struct UniformContext {
    /// Seconds since the renderer started.
    pub time: f64,
    pub frame_index: u64,
    pub view: CameraView,
}

pub type UniformAccessor = Arc<dyn Fn(&UniformContext) -> UniformValue + Send + Sync>;

/// Source of a custom uniform's value.
#[derive(Clone)]
pub enum UniformBinding {
    Constant(UniformValue),
    /// Evaluated once per draw command per frame.
    PerDraw(UniformAccessor),
}

impl UniformBinding {
    pub fn per_draw(f: impl Fn(&UniformContext) -> UniformValue + Send + Sync + 'static) -> Self {
        UniformBinding::PerDraw(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &UniformContext) -> UniformValue {
        match self {
            UniformBinding::Constant(v) => *v,
            UniformBinding::PerDraw(f) => f(ctx),
        }
    }
}

impl fmt::Debug for UniformBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformBinding::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            UniformBinding::PerDraw(_) => f.write_str("PerDraw(..)"),
        }
    }
}

/// Vertex + fragment sources and a uniform-binding table.
///
/// Immutable once built; share it as `Arc<ShaderProgram>`. The binding table
/// does not take part in identity: when two programs share sources, the
/// first one registered with the renderer provides the table.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    id: ProgramId,
    vertex: Cow<'static, str>,
    fragment: Cow<'static, str>,
    uniforms: Vec<(String, UniformBinding)>,
}

impl ShaderProgram {
    pub fn new(vertex: impl Into<Cow<'static, str>>, fragment: impl Into<Cow<'static, str>>) -> Self {
        let vertex = vertex.into();
        let fragment = fragment.into();
        Self {
            id: ProgramId::from_sources(&vertex, &fragment),
            vertex,
            fragment,
            uniforms: Vec::new(),
        }
    }

    /// The built-in lit sprite program.
    pub fn sprite() -> Self {
        Self::new(SPRITE_VERTEX_WGSL, SPRITE_FRAGMENT_WGSL)
    }

    /// Adds or replaces the binding for `name`.
    pub fn with_uniform(mut self, name: impl Into<String>, binding: UniformBinding) -> Self {
        let name = name.into();
        match self.uniforms.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = binding,
            None => self.uniforms.push((name, binding)),
        }
        self
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment
    }

    pub fn uniforms(&self) -> &[(String, UniformBinding)] {
        &self.uniforms
    }

    pub fn source(&self) -> ProgramSource<'_> {
        ProgramSource {
            vertex: &self.vertex,
            fragment: &self.fragment,
        }
    }

    pub fn layout(&self) -> ProgramLayout {
        ProgramLayout {
            uniforms: self.uniforms.iter().map(|(n, _)| n.clone()).collect(),
        }
    }

    /// Evaluates every binding for one draw.
    pub fn resolve_uniforms(&self, ctx: &UniformContext) -> Vec<(String, UniformValue)> {
        self.uniforms
            .iter()
            .map(|(n, b)| (n.clone(), b.resolve(ctx)))
            .collect()
    }
}

impl Default for ShaderProgram {
    fn default() -> Self {
        Self::sprite()
    }
}
