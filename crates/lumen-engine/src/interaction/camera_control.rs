use crate::config::EngineConfig;
use crate::coords::Vec2;
use crate::error::{EngineError, Result};
use crate::scene::{NodeId, Scene};

/// Pan and zoom of a camera node.
///
/// Panning moves the camera opposite to the drag so the content follows the
/// pointer. Zooming changes `zoom` linearly with the wheel and clamps it to
/// `[zoom_min, zoom_max]`.
#[derive(Debug, Clone)]
pub struct CameraControl {
    panning: bool,
    zoom_min: f32,
    zoom_max: f32,
    /// Zoom change per 100 wheel units.
    zoom_step: f32,
}

impl CameraControl {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            panning: false,
            zoom_min: config.zoom_min,
            zoom_max: config.zoom_max,
            zoom_step: config.zoom_step,
        }
    }

    #[inline]
    pub fn is_panning(&self) -> bool {
        self.panning
    }

    pub fn begin_pan(&mut self) {
        self.panning = true;
    }

    pub fn end_pan(&mut self) {
        self.panning = false;
    }

    /// Applies a drag of `delta_px` screen pixels. No-op unless panning.
    pub fn pan(&self, scene: &mut Scene, camera: NodeId, delta_px: Vec2) -> Result<bool> {
        if !self.panning {
            return Ok(false);
        }
        let zoom = camera_zoom(scene, camera)?;
        let node = scene.get_mut(camera)?;
        let ppu = if node.pixels_per_unit != 0.0 { node.pixels_per_unit } else { 1.0 };
        node.position -= delta_px / zoom / ppu;
        Ok(true)
    }

    /// Applies a wheel movement of `delta_y` pixels and returns the new zoom.
    pub fn zoom(&self, scene: &mut Scene, camera: NodeId, delta_y: f32) -> Result<f32> {
        let current = camera_zoom(scene, camera)?;
        let next = (current - delta_y * self.zoom_step / 100.0).clamp(self.zoom_min, self.zoom_max);

        let node = scene.get_mut(camera)?;
        let cam = node.kind.as_camera_mut().ok_or(EngineError::NotACamera(camera))?;
        cam.set_zoom(next)?;
        Ok(next)
    }
}

impl Default for CameraControl {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn camera_zoom(scene: &Scene, camera: NodeId) -> Result<f32> {
    scene
        .get(camera)?
        .kind
        .as_camera()
        .map(|c| c.zoom())
        .ok_or(EngineError::NotACamera(camera))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::scene::NodeKind;

    fn scene_with_camera(zoom: f32) -> (Scene, NodeId) {
        let mut s = Scene::new("t");
        let mut cam = Camera::default();
        cam.set_zoom(zoom).unwrap();
        let id = s.create_node(NodeKind::Camera(cam), "cam", None, None).unwrap();
        (s, id)
    }

    fn zoom_of(s: &Scene, id: NodeId) -> f32 {
        s.get(id).unwrap().kind.as_camera().unwrap().zoom()
    }

    // ── pan ───────────────────────────────────────────────────────────────

    #[test]
    fn pan_moves_against_the_drag_scaled_by_zoom() {
        let (mut s, cam) = scene_with_camera(2.0);
        let mut c = CameraControl::default();
        c.begin_pan();
        assert!(c.pan(&mut s, cam, Vec2::new(10.0, -4.0)).unwrap());
        assert_eq!(s.get(cam).unwrap().position, Vec2::new(-5.0, 2.0));
    }

    #[test]
    fn pan_requires_an_active_drag() {
        let (mut s, cam) = scene_with_camera(1.0);
        let c = CameraControl::default();
        assert!(!c.pan(&mut s, cam, Vec2::new(10.0, 0.0)).unwrap());
        assert_eq!(s.get(cam).unwrap().position, Vec2::ZERO);
    }

    // ── zoom ──────────────────────────────────────────────────────────────

    #[test]
    fn wheel_down_zooms_out() {
        let (mut s, cam) = scene_with_camera(1.0);
        let c = CameraControl::default();
        let z = c.zoom(&mut s, cam, 100.0).unwrap();
        assert!((z - 0.9).abs() < 1e-6);
        assert!((zoom_of(&s, cam) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_clamped() {
        let (mut s, cam) = scene_with_camera(1.0);
        let c = CameraControl::default();
        assert_eq!(c.zoom(&mut s, cam, 1.0e6).unwrap(), 0.1);
        assert_eq!(c.zoom(&mut s, cam, -1.0e6).unwrap(), 10.0);
    }

    #[test]
    fn non_camera_is_rejected() {
        let mut s = Scene::new("t");
        let id = s.create_node(NodeKind::Generic, "n", None, None).unwrap();
        let c = CameraControl::default();
        assert!(matches!(c.zoom(&mut s, id, 1.0), Err(EngineError::NotACamera(_))));
    }
}
