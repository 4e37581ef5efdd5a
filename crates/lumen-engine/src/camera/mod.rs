//! 2D orthographic camera.
//!
//! [`Camera`] is the node payload (just the zoom distance). [`CameraView`] is
//! the per-frame snapshot combining it with the node's world position and the
//! canvas size; it owns projection, culling and screen↔world mapping.

mod component;
mod view;

pub use component::Camera;
pub use view::{is_node_visible, CameraView};
