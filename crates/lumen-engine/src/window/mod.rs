//! Window + runtime loop.
//!
//! Owns the `winit` event loop and the window, builds the wgpu backend for it
//! and drives an [`Engine`](crate::Engine) once per redraw.

mod runtime;

pub use runtime::{App, AppControl, Runtime, RuntimeConfig};
