use crate::coords::{orthographic, Mat4, Rect, Vec2, Viewport};
use crate::error::{EngineError, Result};
use crate::scene::{transform, NodeId, Scene};

/// Camera state resolved for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraView {
    /// Camera world position; the center of the screen.
    pub position: Vec2,
    pub zoom: f32,
    pub viewport: Viewport,
}

impl CameraView {
    pub fn new(position: Vec2, zoom: f32, viewport: Viewport) -> Self {
        Self {
            position,
            zoom,
            viewport,
        }
    }

    /// Resolves the camera node `camera` of `scene`.
    pub fn from_scene(scene: &Scene, camera: NodeId, viewport: Viewport) -> Result<Self> {
        let node = scene.get(camera)?;
        let cam = node.kind.as_camera().ok_or(EngineError::NotACamera(camera))?;
        let position = transform::world_position(scene, camera)?;
        Ok(Self::new(position, cam.zoom(), viewport))
    }

    /// Orthographic projection spanning `[-w/2, w/2] × [-h/2, h/2]`.
    pub fn projection_matrix(&self) -> Mat4 {
        orthographic(self.viewport.width, self.viewport.height)
    }

    /// Translate by `-position`, then scale by `zoom`.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_scale(glam::Vec3::new(self.zoom, self.zoom, 1.0))
            * Mat4::from_translation(glam::Vec3::new(-self.position.x, -self.position.y, 0.0))
    }

    pub fn projection_view(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space rectangle covered by the screen.
    pub fn visible_bounds(&self) -> Rect {
        let size = Vec2::new(self.viewport.width, self.viewport.height) / self.zoom;
        Rect::from_center_size(self.position, size)
    }

    pub fn is_rect_visible(&self, bounds: Rect) -> bool {
        self.visible_bounds().overlaps(bounds)
    }

    /// Maps a screen pixel to world space through the inverse projection-view.
    ///
    /// `canvas` is the drawable's rectangle in the same screen space as `(x, y)`.
    /// Points outside the canvas map outside the visible bounds. A singular
    /// projection-view (zero-sized viewport, degenerate zoom) is a fatal error.
    pub fn screen_to_world(&self, canvas: Rect, x: f32, y: f32) -> Result<Vec2> {
        let pv = self.projection_view();
        let det = pv.determinant();
        if det == 0.0 || !det.is_finite() || !pv.is_finite() {
            return Err(EngineError::SingularMatrix);
        }
        if canvas.size.x <= 0.0 || canvas.size.y <= 0.0 {
            return Err(EngineError::Precondition(format!(
                "canvas rectangle must have a positive size, got {:?}",
                canvas.size
            )));
        }

        let ndc_x = 2.0 * (x - canvas.origin.x) / canvas.size.x - 1.0;
        let ndc_y = 1.0 - 2.0 * (y - canvas.origin.y) / canvas.size.y;

        let world = pv.inverse() * glam::Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        if world.w == 0.0 {
            return Err(EngineError::SingularMatrix);
        }
        Ok(Vec2::new(world.x / world.w, world.y / world.w))
    }

    /// Inverse of [`CameraView::screen_to_world`].
    pub fn world_to_screen(&self, canvas: Rect, world: Vec2) -> Vec2 {
        let ndc = self.projection_view() * glam::Vec4::new(world.x, world.y, 0.0, 1.0);
        Vec2::new(
            canvas.origin.x + (ndc.x + 1.0) * 0.5 * canvas.size.x,
            canvas.origin.y + (1.0 - ndc.y) * 0.5 * canvas.size.y,
        )
    }
}

/// Whether `node`'s world bounds overlap the camera's visible bounds.
pub fn is_node_visible(scene: &Scene, node: NodeId, view: &CameraView) -> Result<bool> {
    let bounds = transform::world_bounds(scene, node)?;
    Ok(view.is_rect_visible(bounds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::scene::NodeKind;

    const EPS: f32 = 1e-3;

    fn view_at(pos: Vec2, zoom: f32) -> CameraView {
        CameraView::new(pos, zoom, Viewport::new(800.0, 600.0))
    }

    fn canvas() -> Rect {
        Rect::new(0.0, 0.0, 800.0, 600.0)
    }

    // ── visible bounds / culling ──────────────────────────────────────────

    #[test]
    fn visible_bounds_shrink_with_zoom() {
        let b = view_at(Vec2::new(10.0, 0.0), 2.0).visible_bounds();
        assert_eq!(b, Rect::new(-190.0, -150.0, 400.0, 300.0));
    }

    #[test]
    fn far_away_node_is_not_visible() {
        let mut scene = Scene::new("t");
        let n = scene.create_node(NodeKind::Generic, "far", None, None).unwrap();
        scene.node_mut(n).unwrap().position = Vec2::new(10000.0, 10000.0);
        assert!(!is_node_visible(&scene, n, &view_at(Vec2::ZERO, 1.0)).unwrap());
    }

    #[test]
    fn node_on_the_edge_is_visible() {
        let mut scene = Scene::new("t");
        let n = scene.create_node(NodeKind::Generic, "edge", None, None).unwrap();
        scene.node_mut(n).unwrap().position = Vec2::new(400.5, 0.0);
        assert!(is_node_visible(&scene, n, &view_at(Vec2::ZERO, 1.0)).unwrap());
    }

    // ── screen → world ────────────────────────────────────────────────────

    #[test]
    fn canvas_center_maps_to_camera_position() {
        let w = view_at(Vec2::ZERO, 1.0).screen_to_world(canvas(), 400.0, 300.0).unwrap();
        assert!(w.length() < EPS);

        let w = view_at(Vec2::new(50.0, -20.0), 1.0)
            .screen_to_world(canvas(), 400.0, 300.0)
            .unwrap();
        assert!((w - Vec2::new(50.0, -20.0)).length() < EPS);
    }

    #[test]
    fn top_left_maps_to_visible_min() {
        let v = view_at(Vec2::ZERO, 2.0);
        let w = v.screen_to_world(canvas(), 0.0, 0.0).unwrap();
        assert!((w - v.visible_bounds().min()).length() < EPS);
    }

    #[test]
    fn canvas_offset_is_respected() {
        let v = view_at(Vec2::ZERO, 1.0);
        let shifted = Rect::new(100.0, 50.0, 800.0, 600.0);
        let w = v.screen_to_world(shifted, 500.0, 350.0).unwrap();
        assert!(w.length() < EPS);
    }

    #[test]
    fn outside_canvas_maps_outside_bounds() {
        let v = view_at(Vec2::ZERO, 1.0);
        let w = v.screen_to_world(canvas(), -100.0, 300.0).unwrap();
        assert!(!v.visible_bounds().contains(w));
        assert!((w.x + 500.0).abs() < EPS);
    }

    #[test]
    fn world_to_screen_inverts_screen_to_world() {
        let v = view_at(Vec2::new(3.0, 4.0), 0.5);
        let w = v.screen_to_world(canvas(), 123.0, 456.0).unwrap();
        let s = v.world_to_screen(canvas(), w);
        assert!((s - Vec2::new(123.0, 456.0)).length() < EPS);
    }

    #[test]
    fn degenerate_viewport_is_singular() {
        let v = CameraView::new(Vec2::ZERO, 1.0, Viewport::new(0.0, 600.0));
        assert!(matches!(
            v.screen_to_world(canvas(), 1.0, 1.0),
            Err(EngineError::SingularMatrix)
        ));
    }

    // ── scene resolution ──────────────────────────────────────────────────

    #[test]
    fn from_scene_requires_a_camera_node() {
        let mut scene = Scene::new("t");
        let g = scene.create_node(NodeKind::Generic, "g", None, None).unwrap();
        let c = scene
            .create_node(Camera::new(2.0).unwrap().into(), "cam", None, None)
            .unwrap();
        let vp = Viewport::new(10.0, 10.0);

        assert!(matches!(
            CameraView::from_scene(&scene, g, vp),
            Err(EngineError::NotACamera(_))
        ));
        let view = CameraView::from_scene(&scene, c, vp).unwrap();
        assert_eq!(view.zoom, 0.5);
    }
}
