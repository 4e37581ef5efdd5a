//! Pointer interaction: gizmo, camera control and scene picking.
//!
//! [`Interaction`] routes each [`InputEvent`] to at most one consumer, in
//! priority order: the gizmo (left button on a handle), the camera (middle
//! drag pans, wheel zooms), then the scene picker (buttons and moves).

mod camera_control;
mod gizmo;
mod picking;

pub use camera_control::CameraControl;
pub use gizmo::{Gizmo, GizmoAxis, GizmoHandle};
pub use picking::{PickingDispatcher, PointerAction};

use crate::camera::CameraView;
use crate::config::EngineConfig;
use crate::coords::{Rect, Vec2, Viewport};
use crate::error::Result;
use crate::input::{InputEvent, InputState, MouseButton, MouseButtonState, PointerButtonEvent};
use crate::scene::{NodeId, Scene};

/// Who consumed an input event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InputOutcome {
    Ignored,
    Gizmo,
    Camera,
    /// Dispatched to the scene; carries the receiving node, if any.
    Scene(Option<NodeId>),
}

pub struct Interaction {
    pub camera_control: CameraControl,
    pub gizmo: Gizmo,
    pub picking: PickingDispatcher,
    input: InputState,
}

impl Interaction {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            camera_control: CameraControl::new(config),
            gizmo: Gizmo::new(config),
            picking: PickingDispatcher::new(),
            input: InputState::default(),
        }
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Routes `ev`.
    ///
    /// `camera` is the main camera (screen↔world mapping and pan/zoom target);
    /// without one, the view sits at the origin with zoom 1 and camera control
    /// is inert. `canvas` is the drawable area in the event's pixel space.
    pub fn handle_event(
        &mut self,
        scene: &mut Scene,
        camera: Option<NodeId>,
        canvas: Rect,
        ev: &InputEvent,
    ) -> Result<InputOutcome> {
        let move_delta = self.input.apply_event(ev);

        match ev {
            InputEvent::PointerButton(PointerButtonEvent {
                button, state, x, y, ..
            }) => {
                let view = resolve_view(scene, camera, canvas)?;
                let world = view.screen_to_world(canvas, *x, *y)?;
                match state {
                    MouseButtonState::Pressed => self.on_press(scene, camera, &view, world, *button),
                    MouseButtonState::Released => self.on_release(scene, world, *button),
                }
            }

            InputEvent::PointerMoved(m) => {
                let view = resolve_view(scene, camera, canvas)?;
                let world = view.screen_to_world(canvas, m.x, m.y)?;

                if self.gizmo.on_mouse_move(scene, world)? {
                    return Ok(InputOutcome::Gizmo);
                }
                if let (Some(cam), Some(delta)) = (camera, move_delta) {
                    if self.camera_control.pan(scene, cam, delta)? {
                        return Ok(InputOutcome::Camera);
                    }
                }
                let hit = self.picking.dispatch(scene, world, PointerAction::Move)?;
                Ok(InputOutcome::Scene(hit))
            }

            InputEvent::MouseWheel { delta, .. } => match camera {
                Some(cam) => {
                    self.camera_control.zoom(scene, cam, delta.pixels_y())?;
                    Ok(InputOutcome::Camera)
                }
                None => Ok(InputOutcome::Ignored),
            },

            InputEvent::PointerLeft => {
                // Far outside any node.
                self.picking.pointer_left(scene, Vec2::splat(f32::INFINITY));
                Ok(InputOutcome::Scene(None))
            }

            InputEvent::Focused(false) => {
                self.gizmo.on_mouse_up();
                self.camera_control.end_pan();
                Ok(InputOutcome::Ignored)
            }

            InputEvent::Focused(true) | InputEvent::ModifiersChanged(_) => Ok(InputOutcome::Ignored),
        }
    }

    fn on_press(
        &mut self,
        scene: &mut Scene,
        camera: Option<NodeId>,
        view: &CameraView,
        world: Vec2,
        button: MouseButton,
    ) -> Result<InputOutcome> {
        match button {
            MouseButton::Left if self.gizmo.on_mouse_down(scene, world, view.zoom)? => {
                Ok(InputOutcome::Gizmo)
            }
            MouseButton::Middle if camera.is_some() => {
                self.camera_control.begin_pan();
                Ok(InputOutcome::Camera)
            }
            MouseButton::Left | MouseButton::Right => {
                let hit = self.picking.dispatch(scene, world, PointerAction::Down(button))?;
                Ok(InputOutcome::Scene(hit))
            }
            _ => Ok(InputOutcome::Ignored),
        }
    }

    fn on_release(&mut self, scene: &mut Scene, world: Vec2, button: MouseButton) -> Result<InputOutcome> {
        match button {
            MouseButton::Left if self.gizmo.on_mouse_up() => Ok(InputOutcome::Gizmo),
            MouseButton::Middle if self.camera_control.is_panning() => {
                self.camera_control.end_pan();
                Ok(InputOutcome::Camera)
            }
            MouseButton::Left | MouseButton::Right => {
                let hit = self.picking.dispatch(scene, world, PointerAction::Up(button))?;
                Ok(InputOutcome::Scene(hit))
            }
            _ => Ok(InputOutcome::Ignored),
        }
    }
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn resolve_view(scene: &Scene, camera: Option<NodeId>, canvas: Rect) -> Result<CameraView> {
    let viewport = Viewport::new(canvas.size.x, canvas.size.y);
    match camera {
        Some(cam) => CameraView::from_scene(scene, cam, viewport),
        None => Ok(CameraView::new(Vec2::ZERO, 1.0, viewport)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::scene::{MouseEventKind, NodeKind, SceneEvent};

    const CANVAS: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    struct Fixture {
        scene: Scene,
        camera: NodeId,
        box_node: NodeId,
        ix: Interaction,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new("t");
        let camera = scene
            .create_node(NodeKind::Camera(Camera::default()), "cam", None, None)
            .unwrap();
        let box_node = scene.create_node(NodeKind::Generic, "box", None, None).unwrap();
        {
            let n = scene.node_mut(box_node).unwrap();
            n.scale = Vec2::new(40.0, 40.0);
            n.mouse_detection = true;
        }
        scene.drain_events();
        Fixture {
            scene,
            camera,
            box_node,
            ix: Interaction::default(),
        }
    }

    impl Fixture {
        fn send(&mut self, ev: InputEvent) -> InputOutcome {
            self.ix
                .handle_event(&mut self.scene, Some(self.camera), CANVAS, &ev)
                .unwrap()
        }

        fn mouse_kinds(&mut self) -> Vec<MouseEventKind> {
            self.scene
                .drain_events()
                .into_iter()
                .filter_map(|e| match e {
                    SceneEvent::Mouse(m) => Some(m.kind),
                    _ => None,
                })
                .collect()
        }
    }

    // ── routing ───────────────────────────────────────────────────────────

    #[test]
    fn click_at_canvas_center_hits_node_at_origin() {
        let mut f = fixture();
        let out = f.send(InputEvent::press(MouseButton::Left, 400.0, 300.0));
        assert_eq!(out, InputOutcome::Scene(Some(f.box_node)));
        assert_eq!(f.mouse_kinds(), vec![MouseEventKind::Down]);
    }

    #[test]
    fn gizmo_press_hides_the_event_from_the_scene() {
        let mut f = fixture();
        f.ix.gizmo.set_target(Some(f.box_node));

        // On the X handle, 50 px right of the node, and inside nothing else.
        assert_eq!(f.send(InputEvent::press(MouseButton::Left, 450.0, 300.0)), InputOutcome::Gizmo);
        assert_eq!(f.send(InputEvent::moved(460.0, 300.0)), InputOutcome::Gizmo);
        assert_eq!(f.send(InputEvent::release(MouseButton::Left, 460.0, 300.0)), InputOutcome::Gizmo);

        assert!(f.mouse_kinds().is_empty());
        let pos = f.scene.get(f.box_node).unwrap().position;
        assert!((pos - Vec2::new(10.0, 0.0)).length() < 1e-3, "{pos:?}");
    }

    #[test]
    fn middle_drag_pans_the_camera() {
        let mut f = fixture();
        f.send(InputEvent::moved(400.0, 300.0));
        assert_eq!(f.send(InputEvent::press(MouseButton::Middle, 400.0, 300.0)), InputOutcome::Camera);
        assert_eq!(f.send(InputEvent::moved(420.0, 310.0)), InputOutcome::Camera);
        f.send(InputEvent::release(MouseButton::Middle, 420.0, 310.0));

        assert_eq!(f.scene.get(f.camera).unwrap().position, Vec2::new(-20.0, -10.0));
        assert!(!f.ix.camera_control.is_panning());
    }

    #[test]
    fn wheel_zooms_the_camera() {
        let mut f = fixture();
        assert_eq!(f.send(InputEvent::wheel(100.0, 0.0, 0.0)), InputOutcome::Camera);
        let zoom = f.scene.get(f.camera).unwrap().kind.as_camera().unwrap().zoom();
        assert!((zoom - 0.9).abs() < 1e-5);
    }

    #[test]
    fn hover_enter_and_leave_through_moves() {
        let mut f = fixture();
        f.send(InputEvent::moved(10.0, 10.0));
        f.send(InputEvent::moved(400.0, 300.0));
        f.send(InputEvent::moved(405.0, 300.0));
        f.send(InputEvent::moved(10.0, 10.0));

        let kinds = f.mouse_kinds();
        let enters = kinds.iter().filter(|k| **k == MouseEventKind::Enter).count();
        let leaves = kinds.iter().filter(|k| **k == MouseEventKind::Leave).count();
        assert_eq!((enters, leaves), (1, 1));
    }

    #[test]
    fn leaving_the_window_ends_hover() {
        let mut f = fixture();
        f.send(InputEvent::moved(400.0, 300.0));
        f.mouse_kinds();
        f.send(InputEvent::PointerLeft);
        assert_eq!(f.mouse_kinds(), vec![MouseEventKind::Leave]);
    }

    #[test]
    fn without_camera_wheel_is_ignored() {
        let mut f = fixture();
        let out = f
            .ix
            .handle_event(&mut f.scene, None, CANVAS, &InputEvent::wheel(10.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(out, InputOutcome::Ignored);
    }
}
