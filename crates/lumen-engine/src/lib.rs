//! Lumen engine crate.
//!
//! A retained-mode 2D renderer: a scene graph of nodes (sprites, cameras,
//! lights), hierarchical transforms, batched sprite drawing with per-sprite
//! lighting, and mouse picking with editor-style camera and gizmo controls.
//!
//! [`Engine`] ties the pieces together and is generic over the GPU backend:
//! the window runtime drives it with [`render::WgpuContext`], tests with
//! [`render::HeadlessGpu`].

pub mod camera;
pub mod config;
pub mod coords;
pub mod device;
pub mod engine;
pub mod error;
pub mod input;
pub mod interaction;
pub mod lighting;
pub mod logging;
pub mod render;
pub mod scene;
pub mod time;
pub mod window;

pub use config::EngineConfig;
pub use engine::{Engine, EngineHooks};
pub use error::{EngineError, GpuError, Result, TextureError};
