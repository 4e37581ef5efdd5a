use std::collections::BTreeMap;

use crate::error::{EngineError, Result};

use super::edit::{SceneEdit, SceneEditor};
use super::{Node, NodeId, NodeKind, NodeKindTag, SceneEvent, SceneId};

/// Registry of nodes and the only authority for resolving node ids.
///
/// Traversal order is deterministic: roots in ascending id order, each
/// subtree pre-order with children in child-list order.
#[derive(Debug)]
pub struct Scene {
    id: SceneId,
    name: String,
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    default_pixels_per_unit: f32,

    events: Vec<SceneEvent>,

    edits_tx: flume::Sender<SceneEdit>,
    edits_rx: flume::Receiver<SceneEdit>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        let (edits_tx, edits_rx) = flume::unbounded();
        Self {
            id: SceneId::next(),
            name: name.into(),
            nodes: BTreeMap::new(),
            next_id: 1,
            default_pixels_per_unit: 1.0,
            events: Vec::new(),
            edits_tx,
            edits_rx,
        }
    }

    /// Pixel density given to nodes created afterwards.
    pub fn with_pixels_per_unit(mut self, ppu: f32) -> Self {
        self.default_pixels_per_unit = ppu;
        self
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn default_pixels_per_unit(&self) -> f32 {
        self.default_pixels_per_unit
    }

    // ── registry ──────────────────────────────────────────────────────────

    /// Registers a new node and optionally attaches it under `parent`.
    ///
    /// With `id = None` the next free id is assigned. An explicit id that is
    /// already registered fails with [`EngineError::DuplicateNode`]; an unknown
    /// parent fails with [`EngineError::NodeNotFound`]. Nothing is registered
    /// on failure.
    pub fn create_node(
        &mut self,
        kind: NodeKind,
        name: impl Into<String>,
        id: Option<NodeId>,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        let id = match id {
            Some(id) if self.nodes.contains_key(&id) => return Err(EngineError::DuplicateNode(id)),
            Some(id) => id,
            None => self.allocate_id()?,
        };
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(EngineError::NodeNotFound(p));
            }
        }

        self.next_id = self.next_id.max(id.0.saturating_add(1));

        let name = name.into();
        log::trace!("scene '{}': create {} '{}' ({:?})", self.name, id, name, kind.tag());
        self.nodes
            .insert(id, Node::new(id, name, kind, self.default_pixels_per_unit));
        self.events.push(SceneEvent::NodeAdded(id));

        if let Some(p) = parent {
            self.set_parent(id, Some(p))?;
        }
        Ok(id)
    }

    /// Deregisters a node and returns it.
    ///
    /// The node is detached from its parent. Its children are orphaned, not
    /// destroyed: they stay registered as roots.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let mut node = self.nodes.remove(&id).ok_or(EngineError::NodeNotFound(id))?;

        if let Some(p) = node.parent.take() {
            if let Some(parent) = self.nodes.get_mut(&p) {
                parent.children.retain(|c| *c != id);
                self.events.push(SceneEvent::ChildrenChanged(p));
            }
        }

        for child in std::mem::take(&mut node.children) {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = None;
            }
        }

        log::trace!("scene '{}': remove {} '{}'", self.name, id, node.name());
        self.events.push(SceneEvent::NodeRemoved(id));
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Like [`Scene::node`] but with a typed error.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(EngineError::NodeNotFound(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(EngineError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    // ── hierarchy ─────────────────────────────────────────────────────────

    /// Moves `child` under `parent` (appended last), or detaches it with `None`.
    ///
    /// Fails with [`EngineError::InvalidParent`] when `parent` is `child`
    /// itself or one of its descendants.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<()> {
        if !self.nodes.contains_key(&child) {
            return Err(EngineError::NodeNotFound(child));
        }

        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(EngineError::NodeNotFound(p));
            }
            if self.is_ancestor_or_self(child, p) {
                return Err(EngineError::InvalidParent { child, parent: p });
            }
        }

        let old = self.nodes.get(&child).and_then(|n| n.parent);
        if old == parent {
            return Ok(());
        }

        if let Some(o) = old {
            if let Some(op) = self.nodes.get_mut(&o) {
                op.children.retain(|c| *c != child);
                self.events.push(SceneEvent::ChildrenChanged(o));
            }
        }

        if let Some(p) = parent {
            if let Some(np) = self.nodes.get_mut(&p) {
                np.children.push(child);
                self.events.push(SceneEvent::ChildrenChanged(p));
            }
        }

        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = parent;
        }
        Ok(())
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.set_parent(child, Some(parent))
    }

    /// Detaches `child` from `parent`. Returns `false` if it was not a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        let p = self.get(parent)?;
        if !p.children.contains(&child) {
            return Ok(false);
        }
        self.set_parent(child, None)?;
        Ok(true)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children()).unwrap_or(&[])
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.parent(c);
        }
        false
    }

    /// Parentless nodes in ascending id order.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id())
            .collect()
    }

    /// Pre-order walk over every node.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root_nodes().into_iter().rev().collect();

        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Pre-order walk over the subtree rooted at `root`, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// True when the node and every ancestor are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            match self.nodes.get(&c) {
                Some(n) if n.visible => cursor = n.parent,
                _ => return false,
            }
        }
        true
    }

    // ── queries ───────────────────────────────────────────────────────────

    /// First node named `name`, in traversal order.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.traverse()
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name() == name))
    }

    pub fn find_all_nodes(&self, mut pred: impl FnMut(&Node) -> bool) -> Vec<NodeId> {
        self.traverse()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(&mut pred))
            .collect()
    }

    /// Every node of the given variant, in traversal order.
    pub fn find_all_nodes_of_type(&self, tag: NodeKindTag) -> Vec<NodeId> {
        self.find_all_nodes(|n| n.tag() == tag)
    }

    /// First direct child of `parent` with the given variant.
    pub fn find_child_of_type(&self, parent: NodeId, tag: NodeKindTag) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.tag() == tag))
    }

    /// Children of `parent` with the given variant; the whole subtree unless
    /// `direct_only`.
    pub fn find_all_children_of_type(
        &self,
        parent: NodeId,
        tag: NodeKindTag,
        direct_only: bool,
    ) -> Vec<NodeId> {
        let candidates = if direct_only {
            self.children(parent).to_vec()
        } else {
            self.descendants(parent)
        };
        candidates
            .into_iter()
            .filter(|c| self.nodes.get(c).is_some_and(|n| n.tag() == tag))
            .collect()
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let new = name.into();
        let node = self.get_mut(id)?;
        if node.name() == new {
            return Ok(());
        }
        let old = node.set_name(new.clone());
        self.events.push(SceneEvent::NameChanged { node: id, old, new });
        Ok(())
    }

    // ── events ────────────────────────────────────────────────────────────

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn push_event(&mut self, ev: SceneEvent) {
        self.events.push(ev);
    }

    /// Updates the transient hover flag, returning the previous value.
    pub(crate) fn set_mouse_over(&mut self, id: NodeId, over: bool) -> Option<bool> {
        self.nodes
            .get_mut(&id)
            .map(|n| std::mem::replace(&mut n.mouse_over, over))
    }

    // ── deferred edits ────────────────────────────────────────────────────

    pub fn editor(&self) -> SceneEditor {
        SceneEditor {
            tx: self.edits_tx.clone(),
        }
    }

    /// Applies queued edits in send order and returns how many were applied.
    ///
    /// A failing edit is logged and skipped; the rest still apply.
    pub fn apply_pending_edits(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(edit) = self.edits_rx.try_recv() {
            match self.apply_edit(edit) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("scene '{}': queued edit rejected: {e}", self.name),
            }
        }
        applied
    }

    fn apply_edit(&mut self, edit: SceneEdit) -> Result<()> {
        match edit {
            SceneEdit::Create {
                kind,
                name,
                id,
                parent,
            } => self.create_node(kind, name, id, parent).map(|_| ()),
            SceneEdit::Remove(id) => self.remove_node(id).map(|_| ()),
            SceneEdit::SetParent { node, parent } => self.set_parent(node, parent),
            SceneEdit::SetTransform {
                node,
                position,
                rotation,
                scale,
            } => {
                let n = self.get_mut(node)?;
                n.position = position;
                n.rotation = rotation;
                n.scale = scale;
                Ok(())
            }
            SceneEdit::SetVisible { node, visible } => {
                self.get_mut(node)?.visible = visible;
                Ok(())
            }
            SceneEdit::Rename { node, name } => self.rename(node, name),
        }
    }

    fn allocate_id(&mut self) -> Result<NodeId> {
        let mut candidate = self.next_id;
        while self.nodes.contains_key(&NodeId(candidate)) {
            match candidate.checked_add(1) {
                Some(next) => candidate = next,
                None => return self.lowest_free_id(),
            }
        }
        self.next_id = candidate.saturating_add(1);
        Ok(NodeId(candidate))
    }

    /// First gap in the id space once the counter has run off the end.
    fn lowest_free_id(&self) -> Result<NodeId> {
        let mut expected = 1u64;
        for id in self.nodes.keys() {
            if id.0 > expected {
                break;
            }
            if id.0 == expected {
                expected = expected
                    .checked_add(1)
                    .ok_or_else(|| EngineError::Precondition("no free node id left".into()))?;
            }
        }
        Ok(NodeId(expected))
    }

    /// Inserts a fully built node as-is. Links are fixed up by the caller.
    pub(super) fn insert_raw(&mut self, node: Node) {
        self.next_id = self.next_id.max(node.id().0.saturating_add(1));
        self.nodes.insert(node.id(), node);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new("scene")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;

    fn generic(scene: &mut Scene, name: &str, parent: Option<NodeId>) -> NodeId {
        scene.create_node(NodeKind::Generic, name, None, parent).unwrap()
    }

    // ── create / remove ───────────────────────────────────────────────────

    #[test]
    fn create_assigns_increasing_ids() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        let b = generic(&mut s, "b", None);
        assert!(b > a);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn explicit_id_collision_is_rejected() {
        let mut s = Scene::new("t");
        s.create_node(NodeKind::Generic, "a", Some(NodeId(7)), None).unwrap();
        let err = s.create_node(NodeKind::Generic, "b", Some(NodeId(7)), None);
        assert!(matches!(err, Err(EngineError::DuplicateNode(NodeId(7)))));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn auto_ids_skip_explicit_ones() {
        let mut s = Scene::new("t");
        s.create_node(NodeKind::Generic, "a", Some(NodeId(1)), None).unwrap();
        let b = generic(&mut s, "b", None);
        assert_ne!(b, NodeId(1));
    }

    #[test]
    fn auto_ids_after_the_largest_id_reuse_gaps() {
        let mut s = Scene::new("t");
        let first = generic(&mut s, "a", None);
        s.create_node(NodeKind::Generic, "max", Some(NodeId(u64::MAX)), None)
            .unwrap();

        let next = generic(&mut s, "b", None);
        let after = generic(&mut s, "c", None);
        assert_eq!(first, NodeId(1));
        assert_eq!(next, NodeId(2));
        assert_eq!(after, NodeId(3));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn loading_the_largest_id_leaves_room_for_new_nodes() {
        let json = format!(r#"{{ "name": "s", "nodes": [ {{ "__type": "Node", "id": {} }} ] }}"#, u64::MAX);
        let mut s = Scene::from_json(&json).unwrap();
        let id = s.create_node(NodeKind::Generic, "new", None, None).unwrap();
        assert_eq!(id, NodeId(1));
    }

    #[test]
    fn create_under_unknown_parent_registers_nothing() {
        let mut s = Scene::new("t");
        let err = s.create_node(NodeKind::Generic, "a", None, Some(NodeId(99)));
        assert!(matches!(err, Err(EngineError::NodeNotFound(NodeId(99)))));
        assert!(s.is_empty());
    }

    #[test]
    fn remove_orphans_children() {
        let mut s = Scene::new("t");
        let p = generic(&mut s, "p", None);
        let c = generic(&mut s, "c", Some(p));
        s.remove_node(p).unwrap();
        assert!(s.contains(c));
        assert_eq!(s.parent(c), None);
        assert_eq!(s.root_nodes(), vec![c]);
    }

    #[test]
    fn remove_detaches_from_parent() {
        let mut s = Scene::new("t");
        let p = generic(&mut s, "p", None);
        let c = generic(&mut s, "c", Some(p));
        s.remove_node(c).unwrap();
        assert!(s.children(p).is_empty());
    }

    #[test]
    fn reparented_node_survives_former_parent_removal() {
        let mut s = Scene::new("t");
        let old = generic(&mut s, "old", None);
        let new = generic(&mut s, "new", None);
        let n = generic(&mut s, "n", Some(old));
        s.node_mut(n).unwrap().position = Vec2::new(1.0, 1.0);

        s.set_parent(n, Some(new)).unwrap();
        s.remove_node(old).unwrap();

        assert!(s.contains(n));
        assert_eq!(s.parent(n), Some(new));
        assert_eq!(s.children(new), &[n]);
    }

    #[test]
    fn remove_unknown_node_errors() {
        let mut s = Scene::new("t");
        assert!(matches!(s.remove_node(NodeId(3)), Err(EngineError::NodeNotFound(_))));
    }

    // ── hierarchy ─────────────────────────────────────────────────────────

    #[test]
    fn self_parenting_is_rejected() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        assert!(matches!(s.set_parent(a, Some(a)), Err(EngineError::InvalidParent { .. })));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        let b = generic(&mut s, "b", Some(a));
        let c = generic(&mut s, "c", Some(b));
        assert!(matches!(s.set_parent(a, Some(c)), Err(EngineError::InvalidParent { .. })));
        assert_eq!(s.parent(a), None);
    }

    #[test]
    fn remove_child_reports_membership() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        let b = generic(&mut s, "b", Some(a));
        let c = generic(&mut s, "c", None);
        assert!(!s.remove_child(a, c).unwrap());
        assert!(s.remove_child(a, b).unwrap());
        assert_eq!(s.parent(b), None);
    }

    #[test]
    fn traverse_is_preorder_with_roots_by_id() {
        let mut s = Scene::new("t");
        let r1 = generic(&mut s, "r1", None);
        let r2 = generic(&mut s, "r2", None);
        let a = generic(&mut s, "a", Some(r1));
        let b = generic(&mut s, "b", Some(r1));
        let a1 = generic(&mut s, "a1", Some(a));
        assert_eq!(s.traverse(), vec![r1, a, a1, b, r2]);
    }

    #[test]
    fn visibility_inherits_from_ancestors() {
        let mut s = Scene::new("t");
        let p = generic(&mut s, "p", None);
        let c = generic(&mut s, "c", Some(p));
        assert!(s.is_visible(c));
        s.node_mut(p).unwrap().visible = false;
        assert!(!s.is_visible(c));
    }

    // ── typed queries ─────────────────────────────────────────────────────

    #[test]
    fn typed_queries_filter_by_variant() {
        use crate::camera::Camera;

        let mut s = Scene::new("t");
        let root = generic(&mut s, "root", None);
        let cam = s.create_node(Camera::default().into(), "cam", None, Some(root)).unwrap();
        let g = generic(&mut s, "g", Some(root));
        let deep = s.create_node(Camera::default().into(), "deep", None, Some(g)).unwrap();

        assert_eq!(s.find_all_nodes_of_type(NodeKindTag::Camera), vec![cam, deep]);
        assert_eq!(s.find_child_of_type(root, NodeKindTag::Camera), Some(cam));
        assert_eq!(s.find_all_children_of_type(root, NodeKindTag::Camera, true), vec![cam]);
        assert_eq!(
            s.find_all_children_of_type(root, NodeKindTag::Camera, false),
            vec![cam, deep]
        );
        assert_eq!(s.find_node("deep"), Some(deep));
    }

    // ── events ────────────────────────────────────────────────────────────

    #[test]
    fn events_are_recorded_and_drained() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        let b = generic(&mut s, "b", Some(a));
        s.rename(b, "bee").unwrap();
        s.remove_node(b).unwrap();

        let events = s.drain_events();
        assert_eq!(
            events,
            vec![
                SceneEvent::NodeAdded(a),
                SceneEvent::NodeAdded(b),
                SceneEvent::ChildrenChanged(a),
                SceneEvent::NameChanged {
                    node: b,
                    old: "b".into(),
                    new: "bee".into()
                },
                SceneEvent::ChildrenChanged(a),
                SceneEvent::NodeRemoved(b),
            ]
        );
        assert!(s.drain_events().is_empty());
    }

    // ── edit queue ────────────────────────────────────────────────────────

    #[test]
    fn editor_edits_apply_on_drain() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        let editor = s.editor();

        let handle = std::thread::spawn(move || {
            editor.set_transform(a, Vec2::new(4.0, 2.0), 0.0, Vec2::ONE);
            editor.create(NodeKind::Generic, "from-thread", Some(a));
        });
        handle.join().unwrap();

        assert_eq!(s.node(a).unwrap().position, Vec2::ZERO);
        assert_eq!(s.apply_pending_edits(), 2);
        assert_eq!(s.node(a).unwrap().position, Vec2::new(4.0, 2.0));
        assert!(s.find_node("from-thread").is_some());
    }

    #[test]
    fn rejected_edit_does_not_block_the_queue() {
        let mut s = Scene::new("t");
        let a = generic(&mut s, "a", None);
        let editor = s.editor();
        editor.remove(NodeId(404));
        editor.set_visible(a, false);
        assert_eq!(s.apply_pending_edits(), 1);
        assert!(!s.node(a).unwrap().visible);
    }
}
