//! JSON scene documents.
//!
//! ```json
//! { "name": "level", "pixelsPerUnit": 1.0, "nodes": [
//!   { "__type": "Sprite", "id": 1, "name": "hero", "parentId": null,
//!     "childrenIds": [], "position": [0, 0], "rotation": 0, "scale": [50, 50],
//!     "visible": true, "mouseDetection": false, "pixelsPerUnit": 1.0,
//!     "tint": [1, 0, 0, 1], "sourceRect": [0, 0, 1, 1], "zIndex": 0,
//!     "textureUrl": "hero.png" } ] }
//! ```
//!
//! Textures, shader programs and transient state (hover flags, pending events)
//! are not serialized. Loaded sprites and point lights keep their texture URL;
//! see [`Scene::pending_texture_urls`] and [`Scene::attach_texture`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::coords::{ColorRgba, Rect, Vec2};
use crate::error::{EngineError, Result};
use crate::lighting::{BlendMode, Light, PointLight};
use crate::render::{Sprite, TextureHandle};

use super::{Node, NodeId, NodeKind, NodeKindTag, Scene, ZIndex};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneDocument {
    name: String,
    #[serde(default = "default_ppu")]
    pixels_per_unit: f32,
    #[serde(default)]
    nodes: Vec<NodeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    #[serde(rename = "__type")]
    type_name: String,
    id: NodeId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parent_id: Option<NodeId>,
    #[serde(default)]
    children_ids: Vec<NodeId>,
    #[serde(default)]
    position: Vec2,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_scale")]
    scale: Vec2,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    mouse_detection: bool,
    #[serde(default = "default_ppu")]
    pixels_per_unit: f32,
    #[serde(flatten)]
    data: KindData,
}

/// Variant payload, flattened into the node record. Only the fields of the
/// node's own variant are written.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KindData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tint: Option<ColorRgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    z_index: Option<ZIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    texture_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<ColorRgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intensity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blend_mode: Option<BlendMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    texture_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    distance: Option<f32>,
}

fn default_ppu() -> f32 {
    1.0
}

fn default_scale() -> Vec2 {
    Vec2::ONE
}

fn default_true() -> bool {
    true
}

// ── kind <-> record ───────────────────────────────────────────────────────

impl KindData {
    fn from_kind(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Generic => KindData::default(),
            NodeKind::Sprite(s) => KindData {
                tint: Some(s.tint),
                source_rect: Some(s.source_rect),
                z_index: Some(s.z),
                texture_url: s.texture_url.clone(),
                ..Default::default()
            },
            NodeKind::GlobalLight(l) => KindData::light(l),
            NodeKind::PointLight(p) => KindData {
                texture_scale: Some(p.texture_scale),
                radius: Some(p.radius),
                texture_url: p.texture_url.clone(),
                ..KindData::light(&p.light)
            },
            NodeKind::Camera(c) => KindData {
                distance: Some(c.distance()),
                ..Default::default()
            },
        }
    }

    fn light(l: &Light) -> Self {
        KindData {
            color: Some(l.color),
            intensity: Some(l.intensity),
            blend_mode: Some(l.blend_mode),
            ..Default::default()
        }
    }

    fn to_light(&self) -> Light {
        let d = Light::default();
        Light::new(
            self.color.unwrap_or(d.color),
            self.intensity.unwrap_or(d.intensity),
            self.blend_mode.unwrap_or(d.blend_mode),
        )
    }

    fn into_kind(self, tag: NodeKindTag) -> Result<NodeKind> {
        Ok(match tag {
            NodeKindTag::Generic => NodeKind::Generic,
            NodeKindTag::Sprite => {
                let mut s = Sprite::default();
                s.texture_url = self.texture_url;
                if let Some(t) = self.tint {
                    s.tint = t;
                }
                if let Some(r) = self.source_rect {
                    s.source_rect = r;
                }
                if let Some(z) = self.z_index {
                    s.z = z;
                }
                NodeKind::Sprite(s)
            }
            NodeKindTag::GlobalLight => NodeKind::GlobalLight(self.to_light()),
            NodeKindTag::PointLight => {
                let mut p = PointLight::new(self.to_light());
                p.texture_url = self.texture_url;
                if let Some(s) = self.texture_scale {
                    p.texture_scale = s;
                }
                if let Some(r) = self.radius {
                    p.radius = r;
                }
                NodeKind::PointLight(p)
            }
            NodeKindTag::Camera => match self.distance {
                Some(d) => NodeKind::Camera(Camera::new(d)?),
                None => NodeKind::Camera(Camera::default()),
            },
        })
    }
}

// ── scene ─────────────────────────────────────────────────────────────────

impl Scene {
    /// Writes the scene as a pretty-printed JSON document, nodes in traversal
    /// order.
    pub fn to_json(&self) -> Result<String> {
        let nodes = self
            .traverse()
            .into_iter()
            .filter_map(|id| self.node(id))
            .map(|n| NodeRecord {
                type_name: n.tag().type_name().to_owned(),
                id: n.id(),
                name: n.name().to_owned(),
                parent_id: n.parent(),
                children_ids: n.children().to_vec(),
                position: n.position,
                rotation: n.rotation,
                scale: n.scale,
                visible: n.visible,
                mouse_detection: n.mouse_detection,
                pixels_per_unit: n.pixels_per_unit,
                data: KindData::from_kind(&n.kind),
            })
            .collect();

        let doc = SceneDocument {
            name: self.name().to_owned(),
            pixels_per_unit: self.default_pixels_per_unit(),
            nodes,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Rebuilds a scene from [`to_json`](Self::to_json) output.
    ///
    /// `parentId` is authoritative for the hierarchy; `childrenIds` only
    /// orders siblings. Links to missing nodes are dropped and nodes caught in
    /// a parent cycle become roots, each with a warning. Unknown `__type`
    /// values load as plain nodes. Repeated ids fail with
    /// [`EngineError::DuplicateNode`].
    pub fn from_json(json: &str) -> Result<Scene> {
        let doc: SceneDocument = serde_json::from_str(json)?;
        let mut scene = Scene::new(doc.name).with_pixels_per_unit(doc.pixels_per_unit);

        let mut seen = HashSet::new();
        for r in &doc.nodes {
            if !seen.insert(r.id) {
                return Err(EngineError::DuplicateNode(r.id));
            }
        }

        let mut listed: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();

        for r in doc.nodes {
            let tag = NodeKindTag::from_type_name(&r.type_name).unwrap_or_else(|| {
                log::warn!("node {}: unknown type '{}', loading as Node", r.id, r.type_name);
                NodeKindTag::Generic
            });

            if let Some(p) = r.parent_id {
                if p == r.id || !seen.contains(&p) {
                    log::warn!("node {}: dropping parent link to {}", r.id, p);
                } else {
                    parents.insert(r.id, p);
                }
            }
            listed.insert(r.id, r.children_ids);

            let mut node = Node::new(r.id, r.name, r.data.into_kind(tag)?, r.pixels_per_unit);
            node.position = r.position;
            node.rotation = r.rotation;
            node.scale = r.scale;
            node.visible = r.visible;
            node.mouse_detection = r.mouse_detection;
            scene.insert_raw(node);
        }

        break_cycles(&mut parents);

        // Children: listed order first, then unlisted claimants by id.
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (parent, ids) in &listed {
            let ordered = ids
                .iter()
                .copied()
                .filter(|c| parents.get(c) == Some(parent))
                .fold(Vec::new(), |mut acc, c| {
                    if !acc.contains(&c) {
                        acc.push(c);
                    }
                    acc
                });
            children.insert(*parent, ordered);
        }
        let mut claimants: Vec<(NodeId, NodeId)> = parents.iter().map(|(c, p)| (*c, *p)).collect();
        claimants.sort();
        for (child, parent) in claimants {
            let list = children.entry(parent).or_default();
            if !list.contains(&child) {
                log::warn!("node {child}: missing from childrenIds of {parent}, appending");
                list.push(child);
            }
        }

        for (id, p) in parents {
            if let Some(n) = scene.node_mut(id) {
                n.parent = Some(p);
            }
        }
        for (id, list) in children {
            if let Some(n) = scene.node_mut(id) {
                n.children = list;
            }
        }

        log::debug!("loaded scene '{}' with {} node(s)", scene.name(), scene.len());
        Ok(scene)
    }

    /// Texture URLs referenced by sprites and point lights that have no
    /// texture attached, deduplicated, in traversal order.
    pub fn pending_texture_urls(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for id in self.traverse() {
            let Some(node) = self.node(id) else { continue };
            let url = match &node.kind {
                NodeKind::Sprite(s) if s.texture.is_none() => s.texture_url.as_deref(),
                NodeKind::PointLight(p) if p.texture.is_none() => p.texture_url.as_deref(),
                _ => None,
            };
            if let Some(u) = url {
                if !out.iter().any(|o| o == u) {
                    out.push(u.to_owned());
                }
            }
        }
        out
    }

    /// Gives `texture` to every sprite and point light whose URL is `url`.
    /// Returns how many nodes were updated.
    pub fn attach_texture(&mut self, url: &str, texture: &TextureHandle) -> usize {
        let mut n = 0;
        for id in self.traverse() {
            let Some(node) = self.node_mut(id) else { continue };
            let (slot, node_url) = match &mut node.kind {
                NodeKind::Sprite(s) => (&mut s.texture, s.texture_url.as_deref()),
                NodeKind::PointLight(p) => (&mut p.texture, p.texture_url.as_deref()),
                _ => continue,
            };
            if node_url == Some(url) {
                *slot = Some(texture.clone());
                n += 1;
            }
        }
        n
    }
}

/// Detaches the smallest id on every parent cycle. Nodes that merely lead
/// into a cycle keep their parent.
fn break_cycles(parents: &mut HashMap<NodeId, NodeId>) {
    let mut ids: Vec<NodeId> = parents.keys().copied().collect();
    ids.sort();

    for start in ids {
        let mut path = vec![start];
        let mut cur = start;
        while let Some(&p) = parents.get(&cur) {
            if p == start {
                log::warn!("node {start}: parent cycle, detaching");
                parents.remove(&start);
                break;
            }
            if path.contains(&p) {
                // Cycle further up; its own smallest member breaks it.
                break;
            }
            path.push(p);
            cur = p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Scene {
        let mut s = Scene::new("level");
        let root = s.create_node(NodeKind::Generic, "root", None, None).unwrap();
        let hero = s
            .create_node(
                NodeKind::Sprite(Sprite::from_url("hero.png").with_tint(ColorRgba::RED).with_z(ZIndex(3))),
                "hero",
                None,
                Some(root),
            )
            .unwrap();
        {
            let n = s.node_mut(hero).unwrap();
            n.position = Vec2::new(4.0, -2.0);
            n.scale = Vec2::new(50.0, 50.0);
            n.mouse_detection = true;
        }
        s.create_node(
            NodeKind::PointLight(PointLight {
                radius: 6.0,
                texture_url: Some("glow.png".into()),
                ..PointLight::new(Light::new(ColorRgba::BLUE, 0.5, BlendMode::Mix))
            }),
            "lamp",
            None,
            Some(root),
        )
        .unwrap();
        s.create_node(NodeKind::Camera(Camera::new(2.0).unwrap()), "cam", None, None)
            .unwrap();
        s
    }

    // ── round trip ────────────────────────────────────────────────────────

    #[test]
    fn hierarchy_and_payloads_survive() {
        let s = sample();
        let back = Scene::from_json(&s.to_json().unwrap()).unwrap();

        assert_eq!(back.name(), "level");
        assert_eq!(back.traverse(), s.traverse());

        let hero = back.find_node("hero").unwrap();
        let n = back.get(hero).unwrap();
        assert_eq!(n.position, Vec2::new(4.0, -2.0));
        assert!(n.mouse_detection);
        let sprite = n.kind.as_sprite().unwrap();
        assert_eq!(sprite.tint, ColorRgba::RED);
        assert_eq!(sprite.z, ZIndex(3));
        assert_eq!(sprite.texture_url.as_deref(), Some("hero.png"));
        assert!(sprite.texture.is_none());

        let lamp = back.find_node("lamp").unwrap();
        let NodeKind::PointLight(p) = &back.get(lamp).unwrap().kind else {
            panic!("lamp should be a point light");
        };
        assert_eq!(p.radius, 6.0);
        assert_eq!(p.light.blend_mode, BlendMode::Mix);

        let cam = back.find_node("cam").unwrap();
        let NodeKind::Camera(c) = &back.get(cam).unwrap().kind else {
            panic!("cam should be a camera");
        };
        assert_eq!(c.distance(), 2.0);
    }

    #[test]
    fn records_use_camel_case_and_type_tag() {
        let json = sample().to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &v["nodes"][0];
        assert_eq!(first["__type"], "Node");
        assert!(first.get("childrenIds").is_some());
        assert!(first.get("mouseDetection").is_some());
        // Only the variant's own fields are written.
        assert!(first.get("tint").is_none());
    }

    #[test]
    fn new_ids_continue_after_loaded_ones() {
        let mut back = Scene::from_json(&sample().to_json().unwrap()).unwrap();
        let max = back.traverse().into_iter().max().unwrap();
        let fresh = back.create_node(NodeKind::Generic, "new", None, None).unwrap();
        assert!(fresh > max);
    }

    // ── tolerance ─────────────────────────────────────────────────────────

    #[test]
    fn unknown_type_falls_back_to_plain_node() {
        let json = r#"{ "name": "s", "nodes": [
            { "__type": "ParticleEmitter", "id": 1, "name": "fx", "rate": 30 }
        ] }"#;
        let s = Scene::from_json(json).unwrap();
        assert_eq!(s.get(NodeId(1)).unwrap().tag(), NodeKindTag::Generic);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let json = r#"{ "name": "s", "nodes": [ { "__type": "Sprite", "id": 4 } ] }"#;
        let s = Scene::from_json(json).unwrap();
        let n = s.get(NodeId(4)).unwrap();
        assert!(n.visible);
        assert_eq!(n.scale, Vec2::ONE);
        assert_eq!(n.kind.as_sprite().unwrap().tint, ColorRgba::WHITE);
    }

    #[test]
    fn parent_id_wins_over_children_ids() {
        let json = r#"{ "name": "s", "nodes": [
            { "__type": "Node", "id": 1, "childrenIds": [3] },
            { "__type": "Node", "id": 2, "parentId": 1 },
            { "__type": "Node", "id": 3 }
        ] }"#;
        let s = Scene::from_json(json).unwrap();
        assert_eq!(s.children(NodeId(1)), &[NodeId(2)]);
        assert_eq!(s.parent(NodeId(3)), None);
    }

    #[test]
    fn dangling_parent_is_dropped() {
        let json = r#"{ "name": "s", "nodes": [ { "__type": "Node", "id": 1, "parentId": 99 } ] }"#;
        let s = Scene::from_json(json).unwrap();
        assert_eq!(s.parent(NodeId(1)), None);
        assert_eq!(s.root_nodes(), vec![NodeId(1)]);
    }

    #[test]
    fn parent_cycle_is_broken() {
        let json = r#"{ "name": "s", "nodes": [
            { "__type": "Node", "id": 1, "parentId": 2, "childrenIds": [2] },
            { "__type": "Node", "id": 2, "parentId": 1, "childrenIds": [1] }
        ] }"#;
        let s = Scene::from_json(json).unwrap();
        assert_eq!(s.traverse().len(), 2);
        assert_eq!(s.root_nodes().len(), 1);
    }

    #[test]
    fn node_leading_into_a_cycle_keeps_its_parent() {
        let json = r#"{ "name": "s", "nodes": [
            { "__type": "Node", "id": 1, "parentId": 2 },
            { "__type": "Node", "id": 2, "parentId": 3 },
            { "__type": "Node", "id": 3, "parentId": 2 }
        ] }"#;
        let s = Scene::from_json(json).unwrap();
        assert_eq!(s.parent(NodeId(1)), Some(NodeId(2)));
        assert_eq!(s.parent(NodeId(2)), None);
        assert_eq!(s.parent(NodeId(3)), Some(NodeId(2)));
        assert_eq!(s.root_nodes(), vec![NodeId(2)]);
        assert_eq!(s.traverse().len(), 3);
    }

    #[test]
    fn repeated_id_is_rejected() {
        let json = r#"{ "name": "s", "nodes": [
            { "__type": "Node", "id": 1 }, { "__type": "Node", "id": 1 }
        ] }"#;
        assert!(matches!(Scene::from_json(json), Err(EngineError::DuplicateNode(NodeId(1)))));
    }

    #[test]
    fn invalid_camera_distance_is_rejected() {
        let json = r#"{ "name": "s", "nodes": [ { "__type": "Camera", "id": 1, "distance": 0 } ] }"#;
        assert!(matches!(Scene::from_json(json), Err(EngineError::InvalidCameraDistance(_))));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        assert!(matches!(Scene::from_json("{"), Err(EngineError::Serialization(_))));
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn pending_urls_are_deduplicated() {
        let mut s = sample();
        s.create_node(NodeKind::Sprite(Sprite::from_url("hero.png")), "twin", None, None)
            .unwrap();
        assert_eq!(s.pending_texture_urls(), vec!["hero.png".to_string(), "glow.png".to_string()]);
    }

    #[test]
    fn attach_fills_every_matching_node() {
        let mut s = sample();
        s.create_node(NodeKind::Sprite(Sprite::from_url("hero.png")), "twin", None, None)
            .unwrap();
        let (tx, _rx) = flume::unbounded();
        let tex = TextureHandle::new(crate::render::GpuTexture(1), 1, 1, Some("hero.png".into()), tx);

        assert_eq!(s.attach_texture("hero.png", &tex), 2);
        assert_eq!(s.pending_texture_urls(), vec!["glow.png".to_string()]);
        assert_eq!(tex.ref_count(), 3);
    }
}
