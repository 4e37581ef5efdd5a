use crate::coords::Vec2;

use super::{NodeId, NodeKind};

/// A deferred scene mutation.
///
/// Produced by [`SceneEditor`] on any thread and applied by the scene owner
/// with [`Scene::apply_pending_edits`](super::Scene::apply_pending_edits).
#[derive(Debug, Clone)]
pub enum SceneEdit {
    Create {
        kind: NodeKind,
        name: String,
        id: Option<NodeId>,
        parent: Option<NodeId>,
    },
    Remove(NodeId),
    SetParent {
        node: NodeId,
        parent: Option<NodeId>,
    },
    SetTransform {
        node: NodeId,
        position: Vec2,
        rotation: f32,
        scale: Vec2,
    },
    SetVisible {
        node: NodeId,
        visible: bool,
    },
    Rename {
        node: NodeId,
        name: String,
    },
}

/// Cloneable, `Send` handle that queues edits for one scene.
///
/// Edits sent after the scene is dropped are discarded.
#[derive(Debug, Clone)]
pub struct SceneEditor {
    pub(super) tx: flume::Sender<SceneEdit>,
}

impl SceneEditor {
    pub fn push(&self, edit: SceneEdit) {
        if self.tx.send(edit).is_err() {
            log::debug!("scene edit dropped: scene no longer exists");
        }
    }

    pub fn create(&self, kind: NodeKind, name: impl Into<String>, parent: Option<NodeId>) {
        self.push(SceneEdit::Create {
            kind,
            name: name.into(),
            id: None,
            parent,
        });
    }

    pub fn remove(&self, node: NodeId) {
        self.push(SceneEdit::Remove(node));
    }

    pub fn set_parent(&self, node: NodeId, parent: Option<NodeId>) {
        self.push(SceneEdit::SetParent { node, parent });
    }

    pub fn set_transform(&self, node: NodeId, position: Vec2, rotation: f32, scale: Vec2) {
        self.push(SceneEdit::SetTransform {
            node,
            position,
            rotation,
            scale,
        });
    }

    pub fn set_visible(&self, node: NodeId, visible: bool) {
        self.push(SceneEdit::SetVisible { node, visible });
    }

    pub fn rename(&self, node: NodeId, name: impl Into<String>) {
        self.push(SceneEdit::Rename {
            node,
            name: name.into(),
        });
    }
}
