//! Pointer input.
//!
//! Event types are platform-agnostic. The windowed runtime translates winit
//! events through [`platform::winit`]; tests and embedders build
//! [`InputEvent`]s directly.

mod state;
mod types;

pub mod platform;

pub use state::InputState;
pub use types::{
    InputEvent,
    Modifiers,
    MouseButton,
    MouseButtonState,
    MouseWheelDelta,
    PointerButtonEvent,
    PointerMoveEvent,
};
