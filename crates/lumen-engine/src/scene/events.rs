use crate::coords::Vec2;
use crate::input::MouseButton;

use super::NodeId;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseEventKind {
    Down,
    Up,
    Move,
    Enter,
    Leave,
}

/// Mouse event delivered to a single node.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NodeMouseEvent {
    pub node: NodeId,
    pub kind: MouseEventKind,
    /// Set for `Down`/`Up`.
    pub button: Option<MouseButton>,
    /// Pointer position in world space.
    pub world: Vec2,
}

/// Notifications recorded by a [`Scene`](super::Scene).
///
/// Consumed with [`Scene::drain_events`](super::Scene::drain_events).
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    /// The child list of this node changed.
    ChildrenChanged(NodeId),
    NameChanged {
        node: NodeId,
        old: String,
        new: String,
    },
    Mouse(NodeMouseEvent),
}
