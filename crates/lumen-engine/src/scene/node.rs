use crate::coords::Vec2;

use super::{NodeId, NodeKind, NodeKindTag};

/// A spatial node owned by a [`Scene`](super::Scene).
///
/// The local transform, visibility and mouse-detection flag are plain fields.
/// Hierarchy links are ids resolved through the scene and can only be changed
/// through scene operations, which keep both sides of a link consistent.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    pub kind: NodeKind,

    pub position: Vec2,
    /// Radians.
    pub rotation: f32,
    pub scale: Vec2,
    /// Multiplier applied to `position` when composing world positions.
    pub pixels_per_unit: f32,

    pub visible: bool,
    pub mouse_detection: bool,

    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
    pub(super) mouse_over: bool,
}

impl Node {
    pub(super) fn new(id: NodeId, name: String, kind: NodeKind, pixels_per_unit: f32) -> Self {
        Self {
            id,
            name,
            kind,
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            pixels_per_unit,
            visible: true,
            mouse_detection: false,
            parent: None,
            children: Vec::new(),
            mouse_over: false,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in insertion order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the pointer was inside this node at the last dispatched move.
    #[inline]
    pub fn is_mouse_over(&self) -> bool {
        self.mouse_over
    }

    pub(super) fn set_name(&mut self, name: String) -> String {
        std::mem::replace(&mut self.name, name)
    }
}
