use crate::camera::Camera;
use crate::lighting::{Light, PointLight};
use crate::render::Sprite;

/// Closed set of node variants.
///
/// Behavior that depends on the variant matches on this enum; transform logic
/// is shared and lives in [`super::transform`].
#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    /// Plain spatial node used for grouping.
    #[default]
    Generic,
    Sprite(Sprite),
    GlobalLight(Light),
    PointLight(PointLight),
    Camera(Camera),
}

/// Payload-free discriminant of [`NodeKind`], used for typed queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeKindTag {
    Generic,
    Sprite,
    GlobalLight,
    PointLight,
    Camera,
}

impl NodeKindTag {
    /// Name written to the `__type` field of serialized nodes.
    pub const fn type_name(self) -> &'static str {
        match self {
            NodeKindTag::Generic => "Node",
            NodeKindTag::Sprite => "Sprite",
            NodeKindTag::GlobalLight => "GlobalLight",
            NodeKindTag::PointLight => "PointLight",
            NodeKindTag::Camera => "Camera",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "Node" => NodeKindTag::Generic,
            "Sprite" => NodeKindTag::Sprite,
            "GlobalLight" => NodeKindTag::GlobalLight,
            "PointLight" => NodeKindTag::PointLight,
            "Camera" => NodeKindTag::Camera,
            _ => return None,
        })
    }
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Generic => NodeKindTag::Generic,
            NodeKind::Sprite(_) => NodeKindTag::Sprite,
            NodeKind::GlobalLight(_) => NodeKindTag::GlobalLight,
            NodeKind::PointLight(_) => NodeKindTag::PointLight,
            NodeKind::Camera(_) => NodeKindTag::Camera,
        }
    }

    pub fn as_sprite(&self) -> Option<&Sprite> {
        match self {
            NodeKind::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sprite_mut(&mut self) -> Option<&mut Sprite> {
        match self {
            NodeKind::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_global_light(&self) -> Option<&Light> {
        match self {
            NodeKind::GlobalLight(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_point_light(&self) -> Option<&PointLight> {
        match self {
            NodeKind::PointLight(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_point_light_mut(&mut self) -> Option<&mut PointLight> {
        match self {
            NodeKind::PointLight(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            NodeKind::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match self {
            NodeKind::Camera(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Sprite> for NodeKind {
    fn from(s: Sprite) -> Self {
        NodeKind::Sprite(s)
    }
}

impl From<PointLight> for NodeKind {
    fn from(l: PointLight) -> Self {
        NodeKind::PointLight(l)
    }
}

impl From<Camera> for NodeKind {
    fn from(c: Camera) -> Self {
        NodeKind::Camera(c)
    }
}
