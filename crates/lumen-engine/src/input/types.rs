/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseButtonState {
    Pressed,
    Released,
}

/// Modifier keys held while a pointer event happened.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Mouse wheel delta.
///
/// `Line` comes from notched wheels, `Pixel` from touchpads.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MouseWheelDelta {
    Line { x: f32, y: f32 },
    Pixel { x: f32, y: f32 },
}

impl MouseWheelDelta {
    /// Logical pixels per wheel line, matching common browser behavior.
    pub const PIXELS_PER_LINE: f32 = 100.0;

    /// Vertical delta in pixel units; positive scrolls toward the user.
    pub fn pixels_y(self) -> f32 {
        match self {
            MouseWheelDelta::Line { y, .. } => y * Self::PIXELS_PER_LINE,
            MouseWheelDelta::Pixel { y, .. } => y,
        }
    }
}

/// Pointer position in logical pixels relative to the window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerMoveEvent {
    pub x: f32,
    pub y: f32,
}

/// Pointer button transition, with the pointer position at the time.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerButtonEvent {
    pub button: MouseButton,
    pub state: MouseButtonState,
    pub x: f32,
    pub y: f32,
    pub modifiers: Modifiers,
}

/// Raw pointer events, one per OS event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    ModifiersChanged(Modifiers),

    PointerMoved(PointerMoveEvent),
    PointerButton(PointerButtonEvent),

    MouseWheel {
        delta: MouseWheelDelta,
        x: f32,
        y: f32,
        modifiers: Modifiers,
    },

    /// Pointer left the window surface.
    PointerLeft,

    Focused(bool),
}

impl InputEvent {
    /// Convenience constructor for a button press at `(x, y)`.
    pub fn press(button: MouseButton, x: f32, y: f32) -> Self {
        InputEvent::PointerButton(PointerButtonEvent {
            button,
            state: MouseButtonState::Pressed,
            x,
            y,
            modifiers: Modifiers::default(),
        })
    }

    pub fn release(button: MouseButton, x: f32, y: f32) -> Self {
        InputEvent::PointerButton(PointerButtonEvent {
            button,
            state: MouseButtonState::Released,
            x,
            y,
            modifiers: Modifiers::default(),
        })
    }

    pub fn moved(x: f32, y: f32) -> Self {
        InputEvent::PointerMoved(PointerMoveEvent { x, y })
    }

    pub fn wheel(y_pixels: f32, x: f32, y: f32) -> Self {
        InputEvent::MouseWheel {
            delta: MouseWheelDelta::Pixel { x: 0.0, y: y_pixels },
            x,
            y,
            modifiers: Modifiers::default(),
        }
    }
}
