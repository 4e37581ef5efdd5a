//! Coordinate and geometry types shared by the scene, camera and renderer.
//!
//! World space:
//! - one world unit is one logical pixel at zoom 1
//! - origin at the camera center
//! - +X right, +Y down (same orientation as screen space)
//!
//! Screen space is logical pixels relative to the canvas top-left corner.

mod color;
mod matrix;
mod rect;
mod vec2;
mod viewport;

pub use color::ColorRgba;
pub use matrix::{model_matrix, orthographic, Mat4};
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
