use crate::coords::Vec2;
use crate::error::Result;
use crate::input::MouseButton;
use crate::scene::{transform, MouseEventKind, NodeId, NodeMouseEvent, Scene, SceneEvent};

/// Pointer action being dispatched to the scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PointerAction {
    Down(MouseButton),
    Up(MouseButton),
    Move,
}

/// Delivers pointer events to scene nodes.
///
/// Candidates are visible nodes with `mouse_detection` set, tested in scene
/// traversal order against their world bounds. The first hit receives the
/// event and propagation stops there. Moves additionally update every
/// candidate's hover flag and emit `Enter`/`Leave` on transitions.
///
/// Events are recorded in the scene's event queue.
#[derive(Debug, Default)]
pub struct PickingDispatcher {
    last_hit: Option<NodeId>,
}

impl PickingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node that received the most recent event, if any.
    pub fn last_hit(&self) -> Option<NodeId> {
        self.last_hit
    }

    /// First node under `world`, in traversal order.
    pub fn pick(&self, scene: &Scene, world: Vec2) -> Result<Option<NodeId>> {
        for id in candidates(scene) {
            if transform::world_bounds(scene, id)?.contains(world) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Dispatches `action` at world point `world`. Returns the receiving node.
    pub fn dispatch(&mut self, scene: &mut Scene, world: Vec2, action: PointerAction) -> Result<Option<NodeId>> {
        if action == PointerAction::Move {
            self.update_hover(scene, world)?;
        }

        let hit = self.pick(scene, world)?;
        if let Some(node) = hit {
            let (kind, button) = match action {
                PointerAction::Down(b) => (MouseEventKind::Down, Some(b)),
                PointerAction::Up(b) => (MouseEventKind::Up, Some(b)),
                PointerAction::Move => (MouseEventKind::Move, None),
            };
            scene.push_event(SceneEvent::Mouse(NodeMouseEvent {
                node,
                kind,
                button,
                world,
            }));
        }
        self.last_hit = hit;
        Ok(hit)
    }

    /// The pointer left the canvas: every hovered node gets `Leave`.
    pub fn pointer_left(&mut self, scene: &mut Scene, world: Vec2) {
        let hovered: Vec<NodeId> = scene
            .nodes()
            .filter(|n| n.is_mouse_over())
            .map(|n| n.id())
            .collect();
        for id in hovered {
            scene.set_mouse_over(id, false);
            push_transition(scene, id, MouseEventKind::Leave, world);
        }
        self.last_hit = None;
    }

    fn update_hover(&mut self, scene: &mut Scene, world: Vec2) -> Result<()> {
        let mut transitions = Vec::new();
        for id in scene.traverse() {
            let Some(node) = scene.node(id) else { continue };
            let was_over = node.is_mouse_over();
            let detectable = node.mouse_detection && scene.is_visible(id);

            let over = detectable && transform::world_bounds(scene, id)?.contains(world);
            if over != was_over {
                transitions.push((id, over));
            }
        }

        for (id, over) in transitions {
            scene.set_mouse_over(id, over);
            let kind = if over { MouseEventKind::Enter } else { MouseEventKind::Leave };
            push_transition(scene, id, kind, world);
        }
        Ok(())
    }
}

fn candidates(scene: &Scene) -> impl Iterator<Item = NodeId> + '_ {
    scene.traverse().into_iter().filter(move |id| {
        scene
            .node(*id)
            .is_some_and(|n| n.mouse_detection && scene.is_visible(*id))
    })
}

fn push_transition(scene: &mut Scene, node: NodeId, kind: MouseEventKind, world: Vec2) {
    scene.push_event(SceneEvent::Mouse(NodeMouseEvent {
        node,
        kind,
        button: None,
        world,
    }));
}
