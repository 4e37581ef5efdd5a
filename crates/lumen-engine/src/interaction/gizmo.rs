use crate::config::EngineConfig;
use crate::coords::{ColorRgba, Vec2};
use crate::error::Result;
use crate::render::LineSegment;
use crate::scene::{transform, NodeId, Scene};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GizmoAxis {
    X,
    Y,
}

/// One axis handle in world space, for overlays.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GizmoHandle {
    pub axis: GizmoAxis,
    pub start: Vec2,
    pub end: Vec2,
    pub color: ColorRgba,
}

impl From<GizmoHandle> for LineSegment {
    fn from(h: GizmoHandle) -> Self {
        LineSegment {
            start: [h.start.x, h.start.y],
            end: [h.end.x, h.end.y],
            color: h.color.to_array(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Drag {
    axis: GizmoAxis,
    last_world: Vec2,
}

/// Two-axis translate manipulator attached to one node.
///
/// The handles start at the target's world position and extend along +X and
/// +Y. A press within `threshold_px` screen pixels of a handle locks the drag
/// to that axis (X wins when both are in range); each move then shifts the
/// target along the axis by the world-space pointer delta.
#[derive(Debug, Clone)]
pub struct Gizmo {
    target: Option<NodeId>,
    threshold_px: f32,
    handle_length: f32,
    drag: Option<Drag>,
}

impl Gizmo {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            target: None,
            threshold_px: config.gizmo_threshold_px,
            handle_length: config.gizmo_handle_length,
            drag: None,
        }
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Attaches to `target` (or detaches), cancelling any drag.
    pub fn set_target(&mut self, target: Option<NodeId>) {
        self.target = target;
        self.drag = None;
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_axis(&self) -> Option<GizmoAxis> {
        self.drag.map(|d| d.axis)
    }

    /// Starts a drag if `world` is on a handle. Returns whether the press was
    /// consumed.
    ///
    /// `zoom` converts the pixel threshold into world units.
    pub fn on_mouse_down(&mut self, scene: &Scene, world: Vec2, zoom: f32) -> Result<bool> {
        self.drag = None;
        let Some(target) = self.target else { return Ok(false) };
        let origin = transform::world_position(scene, target)?;

        let threshold = if zoom > 0.0 { self.threshold_px / zoom } else { self.threshold_px };
        let d = world - origin;
        let along = |t: f32| t >= -threshold && t <= self.handle_length + threshold;

        let axis = if d.y.abs() <= threshold && along(d.x) {
            Some(GizmoAxis::X)
        } else if d.x.abs() <= threshold && along(d.y) {
            Some(GizmoAxis::Y)
        } else {
            None
        };

        self.drag = axis.map(|axis| Drag { axis, last_world: world });
        if let Some(axis) = axis {
            log::debug!("gizmo: dragging {target} along {axis:?}");
        }
        Ok(axis.is_some())
    }

    /// Moves the target by the pointer delta along the locked axis. Returns
    /// whether the move was consumed.
    pub fn on_mouse_move(&mut self, scene: &mut Scene, world: Vec2) -> Result<bool> {
        let (Some(target), Some(drag)) = (self.target, self.drag.as_mut()) else {
            return Ok(false);
        };

        let delta = world - drag.last_world;
        drag.last_world = world;

        let node = scene.get_mut(target)?;
        let ppu = if node.pixels_per_unit != 0.0 { node.pixels_per_unit } else { 1.0 };
        match drag.axis {
            GizmoAxis::X => node.position.x += delta.x / ppu,
            GizmoAxis::Y => node.position.y += delta.y / ppu,
        }
        Ok(true)
    }

    /// Ends a drag. Returns whether one was active.
    pub fn on_mouse_up(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Overlay lines for the handles; empty without a live target.
    pub fn overlay_lines(&self, scene: &Scene) -> Result<Vec<LineSegment>> {
        match self.target {
            Some(t) if scene.contains(t) => Ok(self
                .handle_segments(scene)?
                .map(|hs| hs.into_iter().map(LineSegment::from).collect())
                .unwrap_or_default()),
            _ => Ok(Vec::new()),
        }
    }

    /// X (red) and Y (green) handles of the current target.
    pub fn handle_segments(&self, scene: &Scene) -> Result<Option<[GizmoHandle; 2]>> {
        let Some(target) = self.target else { return Ok(None) };
        let origin = transform::world_position(scene, target)?;
        Ok(Some([
            GizmoHandle {
                axis: GizmoAxis::X,
                start: origin,
                end: origin + Vec2::new(self.handle_length, 0.0),
                color: ColorRgba::RED,
            },
            GizmoHandle {
                axis: GizmoAxis::Y,
                start: origin,
                end: origin + Vec2::new(0.0, self.handle_length),
                color: ColorRgba::GREEN,
            },
        ]))
    }
}

impl Default for Gizmo {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
