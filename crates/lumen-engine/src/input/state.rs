use std::collections::HashSet;

use crate::coords::Vec2;

use super::types::{InputEvent, Modifiers, MouseButton, MouseButtonState, PointerButtonEvent};

/// Pointer state tracked across events.
///
/// Holds the last pointer position so drags can be expressed as per-event
/// deltas, plus the set of held buttons.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,

    /// Last pointer position in logical pixels.
    pub pointer_pos: Option<Vec2>,

    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Folds `ev` into the state.
    ///
    /// For pointer moves, returns the delta from the previous known position.
    pub fn apply_event(&mut self, ev: &InputEvent) -> Option<Vec2> {
        match ev {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = *m;
                None
            }

            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // Releases are not delivered while unfocused.
                    self.buttons_down.clear();
                }
                None
            }

            InputEvent::PointerMoved(m) => {
                let pos = Vec2::new(m.x, m.y);
                let delta = self.pointer_pos.map(|prev| pos - prev);
                self.pointer_pos = Some(pos);
                delta
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
                None
            }

            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state,
                x,
                y,
                modifiers,
            }) => {
                self.pointer_pos = Some(Vec2::new(*x, *y));
                self.modifiers = *modifiers;
                match state {
                    MouseButtonState::Pressed => {
                        self.buttons_down.insert(*button);
                    }
                    MouseButtonState::Released => {
                        self.buttons_down.remove(button);
                    }
                }
                None
            }

            InputEvent::MouseWheel { modifiers, .. } => {
                self.modifiers = *modifiers;
                None
            }
        }
    }

    pub fn button_down(&self, btn: MouseButton) -> bool {
        self.buttons_down.contains(&btn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_move_has_no_delta() {
        let mut s = InputState::default();
        assert_eq!(s.apply_event(&InputEvent::moved(5.0, 5.0)), None);
        assert_eq!(s.apply_event(&InputEvent::moved(8.0, 1.0)), Some(Vec2::new(3.0, -4.0)));
    }

    #[test]
    fn button_press_updates_position_and_held_set() {
        let mut s = InputState::default();
        s.apply_event(&InputEvent::press(MouseButton::Middle, 10.0, 20.0));
        assert!(s.button_down(MouseButton::Middle));
        assert_eq!(s.pointer_pos, Some(Vec2::new(10.0, 20.0)));
        s.apply_event(&InputEvent::release(MouseButton::Middle, 10.0, 20.0));
        assert!(!s.button_down(MouseButton::Middle));
    }

    #[test]
    fn focus_loss_clears_held_buttons() {
        let mut s = InputState::default();
        s.apply_event(&InputEvent::press(MouseButton::Left, 0.0, 0.0));
        s.apply_event(&InputEvent::Focused(false));
        assert!(s.buttons_down.is_empty());
    }
}
