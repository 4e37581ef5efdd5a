//! 2D lighting.
//!
//! Up to [`MAX_GLOBAL_LIGHTS`] global and [`MAX_POINT_LIGHTS`] point lights
//! are bound per frame. Unused slots always carry an inert light (intensity 0,
//! white, blank mask) so shaders never read undefined uniforms.
//!
//! Blend math is implemented twice: in WGSL (`render/shaders/sprite_frag.wgsl`)
//! and here on the host, where [`shade`] is the reference used by tests.

mod blend;
mod light;
mod uniforms;

pub use blend::BlendMode;
pub use light::{Light, PointLight, DEFAULT_POINT_RADIUS};
pub use uniforms::{
    gather_lights,
    shade,
    GlobalLightUniform,
    LightingUniforms,
    PointLightUniform,
    MAX_GLOBAL_LIGHTS,
    MAX_POINT_LIGHTS,
};
