use crate::camera::CameraView;
use crate::config::EngineConfig;
use crate::coords::{Rect, Vec2, Viewport};
use crate::error::{EngineError, Result};
use crate::input::InputEvent;
use crate::interaction::{Gizmo, InputOutcome, Interaction};
use crate::render::{FrameStats, GpuContext, Renderer};
use crate::scene::{NodeId, NodeKindTag, Scene};
use crate::time::{Clock, FrameHandler};

/// Per-tick callbacks for the application driving an [`Engine`].
pub trait EngineHooks {
    /// Called zero or more times per tick with the fixed delta.
    fn fixed_update(&mut self, _scene: &mut Scene, _dt: f32) {}

    /// Called once per tick before rendering.
    fn update(&mut self, _scene: &mut Scene, _dt: f32) {}
}

/// Hooks that do nothing.
impl EngineHooks for () {}

/// The assembled engine: one active scene, its renderer, clock and input
/// routing.
///
/// The main camera is the one set with [`set_main_camera`](Self::set_main_camera),
/// or else the first camera in scene traversal order.
pub struct Engine<G: GpuContext> {
    config: EngineConfig,
    scene: Scene,
    renderer: Renderer<G>,
    clock: Clock,
    interaction: Interaction,

    main_camera: Option<NodeId>,
    canvas: Rect,

    started_at: Option<f64>,
    last_stats: Option<FrameStats>,
}

impl<G: GpuContext + 'static> Engine<G> {
    pub fn new(gpu: G, config: EngineConfig) -> Self {
        let mut renderer = Renderer::new(gpu);
        renderer.set_clear_color(config.clear_color);

        Self {
            scene: Scene::new("main").with_pixels_per_unit(config.default_pixels_per_unit),
            renderer,
            clock: Clock::new(config.fixed_delta),
            interaction: Interaction::new(&config),
            main_camera: None,
            canvas: Rect::new(0.0, 0.0, 1.0, 1.0),
            started_at: None,
            last_stats: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Makes `scene` active and returns the previous one.
    ///
    /// The main camera selection is reset.
    pub fn replace_scene(&mut self, scene: Scene) -> Scene {
        self.main_camera = None;
        log::info!("active scene: '{}'", scene.name());
        std::mem::replace(&mut self.scene, scene)
    }

    pub fn renderer(&self) -> &Renderer<G> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<G> {
        &mut self.renderer
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut Interaction {
        &mut self.interaction
    }

    pub fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
    }

    // ── camera & canvas ───────────────────────────────────────────────────

    pub fn main_camera(&self) -> Option<NodeId> {
        main_camera_of(&self.scene, self.main_camera)
    }

    pub fn set_main_camera(&mut self, camera: NodeId) -> Result<()> {
        if self.scene.get(camera)?.tag() != NodeKindTag::Camera {
            return Err(EngineError::NotACamera(camera));
        }
        self.main_camera = Some(camera);
        Ok(())
    }

    /// Drawable area in window logical pixels.
    pub fn canvas(&self) -> Rect {
        self.canvas
    }

    pub fn resize(&mut self, canvas: Rect) {
        self.canvas = canvas;
    }

    /// View of the main camera, or a zoom-1 view at the origin without one.
    pub fn view(&self) -> Result<CameraView> {
        view_of(&self.scene, self.main_camera, self.canvas)
    }

    pub fn screen_to_world(&self, x: f32, y: f32) -> Result<Vec2> {
        self.view()?.screen_to_world(self.canvas, x, y)
    }

    // ── per frame ─────────────────────────────────────────────────────────

    pub fn handle_input(&mut self, ev: &InputEvent) -> Result<InputOutcome> {
        let camera = self.main_camera();
        self.interaction
            .handle_event(&mut self.scene, camera, self.canvas, ev)
    }

    /// Advances the engine to `now` seconds.
    ///
    /// Applies queued scene edits, runs `hooks` through the fixed-step clock,
    /// reconciles GPU programs with the scene and renders. The first tick only
    /// records the time base and returns `None`.
    pub fn tick<H: EngineHooks + ?Sized>(&mut self, now: f64, hooks: &mut H) -> Result<Option<FrameStats>> {
        let applied = self.scene.apply_pending_edits();
        if applied > 0 {
            log::trace!("applied {applied} queued scene edit(s)");
        }

        let started = *self.started_at.get_or_insert(now);

        let mut frame = TickFrame {
            scene: &mut self.scene,
            renderer: &mut self.renderer,
            gizmo: &self.interaction.gizmo,
            hooks,
            preferred_camera: self.main_camera,
            canvas: self.canvas,
            time: now - started,
            result: None,
        };
        self.clock.tick(now, &mut frame);

        match frame.result {
            Some(Ok(stats)) => {
                self.last_stats = Some(stats);
                Ok(Some(stats))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// The explicit camera if it is still a camera, else the first one in
/// traversal order.
fn main_camera_of(scene: &Scene, preferred: Option<NodeId>) -> Option<NodeId> {
    match preferred {
        Some(id) if scene.get(id).is_ok_and(|n| n.tag() == NodeKindTag::Camera) => Some(id),
        _ => scene.find_all_nodes_of_type(NodeKindTag::Camera).into_iter().next(),
    }
}

/// View of the main camera, or a zoom-1 view at the origin without one.
fn view_of(scene: &Scene, preferred: Option<NodeId>, canvas: Rect) -> Result<CameraView> {
    let viewport = Viewport::new(canvas.size.x, canvas.size.y);
    match main_camera_of(scene, preferred) {
        Some(cam) => CameraView::from_scene(scene, cam, viewport),
        None => Ok(CameraView::new(Vec2::ZERO, 1.0, viewport)),
    }
}

/// Bridges the clock's callbacks to the engine for one tick.
///
/// The camera is resolved at render time so hook edits show up this frame.
struct TickFrame<'a, G: GpuContext, H: ?Sized> {
    scene: &'a mut Scene,
    renderer: &'a mut Renderer<G>,
    gizmo: &'a Gizmo,
    hooks: &'a mut H,
    preferred_camera: Option<NodeId>,
    canvas: Rect,
    time: f64,
    result: Option<Result<FrameStats>>,
}

impl<G: GpuContext + 'static, H: EngineHooks + ?Sized> FrameHandler for TickFrame<'_, G, H> {
    fn fixed_update(&mut self, dt: f32) {
        self.hooks.fixed_update(self.scene, dt);
    }

    fn update(&mut self, dt: f32) {
        self.hooks.update(self.scene, dt);
    }

    fn render(&mut self, _dt: f32) {
        self.result = Some(self.draw());
    }
}

impl<G: GpuContext + 'static, H: ?Sized> TickFrame<'_, G, H> {
    fn draw(&mut self) -> Result<FrameStats> {
        let view = view_of(self.scene, self.preferred_camera, self.canvas)?;
        self.renderer.sync_resources(self.scene)?;
        let mut stats = self.renderer.render(self.scene, &view, self.time)?;

        let lines = self.gizmo.overlay_lines(self.scene)?;
        stats.overlay_lines = self.renderer.draw_overlay(&view, &lines)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::camera::Camera;
    use crate::coords::ColorRgba;
    use crate::input::MouseButton;
    use crate::render::{HeadlessGpu, ShaderProgram, Sprite};
    use crate::scene::{MouseEventKind, NodeKind, SceneEvent};

    fn engine() -> Engine<HeadlessGpu> {
        let mut e = Engine::new(HeadlessGpu::new(), EngineConfig::default());
        e.resize(Rect::new(0.0, 0.0, 800.0, 600.0));
        e
    }

    fn add_red_sprite(e: &mut Engine<HeadlessGpu>) -> NodeId {
        let tex = e.renderer_mut().create_texture(&[255, 0, 0, 255], 1, 1).unwrap();
        let id = e
            .scene_mut()
            .create_node(NodeKind::Sprite(Sprite::new(tex)), "red", None, None)
            .unwrap();
        e.scene_mut().node_mut(id).unwrap().scale = Vec2::new(50.0, 50.0);
        id
    }

    struct Counter {
        fixed: u32,
        updates: u32,
    }

    impl EngineHooks for Counter {
        fn fixed_update(&mut self, _scene: &mut Scene, _dt: f32) {
            self.fixed += 1;
        }

        fn update(&mut self, scene: &mut Scene, _dt: f32) {
            self.updates += 1;
            if let Some(id) = scene.find_node("red") {
                scene.node_mut(id).unwrap().rotation += 0.1;
            }
        }
    }

    // ── tick ──────────────────────────────────────────────────────────────

    #[test]
    fn first_tick_only_sets_the_baseline() {
        let mut e = engine();
        add_red_sprite(&mut e);
        assert_eq!(e.tick(0.0, &mut ()).unwrap(), None);
        assert!(e.renderer().gpu().lock().draws.is_empty());
    }

    #[test]
    fn tick_runs_hooks_then_draws() {
        let mut e = engine();
        let id = add_red_sprite(&mut e);
        let mut hooks = Counter { fixed: 0, updates: 0 };

        e.tick(0.0, &mut hooks).unwrap();
        let stats = e.tick(0.06, &mut hooks).unwrap().unwrap();

        assert_eq!(hooks.fixed, 3);
        assert_eq!(hooks.updates, 1);
        assert!((e.scene().get(id).unwrap().rotation - 0.1).abs() < 1e-6);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.sprites_drawn, 1);
        assert_eq!(e.last_stats(), Some(stats));
    }

    #[test]
    fn clear_color_comes_from_config() {
        let cfg = EngineConfig {
            clear_color: ColorRgba::BLUE,
            ..Default::default()
        };
        let mut e = Engine::new(HeadlessGpu::new(), cfg);
        e.tick(0.0, &mut ()).unwrap();
        e.tick(0.1, &mut ()).unwrap();
        assert_eq!(e.renderer().gpu().lock().clears[0].0, ColorRgba::BLUE);
    }

    #[test]
    fn queued_edits_land_before_the_frame() {
        let mut e = engine();
        let editor = e.scene().editor();
        let id = add_red_sprite(&mut e);
        editor.set_visible(id, false);

        e.tick(0.0, &mut ()).unwrap();
        let stats = e.tick(0.02, &mut ()).unwrap().unwrap();
        assert_eq!(stats.sprites_drawn, 0);
    }

    #[test]
    fn programs_follow_the_scene() {
        let mut e = engine();
        let id = add_red_sprite(&mut e);
        e.tick(0.0, &mut ()).unwrap();
        e.tick(0.02, &mut ()).unwrap();
        assert_eq!(e.renderer().program_count(), 1);

        e.scene_mut().remove_node(id).unwrap();
        e.tick(0.04, &mut ()).unwrap();
        assert_eq!(e.renderer().program_count(), 0);
    }

    #[test]
    fn broken_custom_program_surfaces_from_tick() {
        let mut e = engine();
        let tex = e.renderer_mut().create_texture(&[0; 4], 1, 1).unwrap();
        let sprite = Sprite::new(tex).with_program(Arc::new(ShaderProgram::new("", "")));
        e.scene_mut()
            .create_node(NodeKind::Sprite(sprite), "bad", None, None)
            .unwrap();

        e.tick(0.0, &mut ()).unwrap();
        assert!(matches!(e.tick(0.02, &mut ()), Err(EngineError::Gpu(_))));
    }

    // ── camera ────────────────────────────────────────────────────────────

    #[test]
    fn first_camera_is_the_default_main_camera() {
        let mut e = engine();
        assert_eq!(e.main_camera(), None);
        let a = e
            .scene_mut()
            .create_node(NodeKind::Camera(Camera::default()), "a", None, None)
            .unwrap();
        let b = e
            .scene_mut()
            .create_node(NodeKind::Camera(Camera::default()), "b", None, None)
            .unwrap();
        assert_eq!(e.main_camera(), Some(a));

        e.set_main_camera(b).unwrap();
        assert_eq!(e.main_camera(), Some(b));

        e.scene_mut().remove_node(b).unwrap();
        assert_eq!(e.main_camera(), Some(a));
    }

    #[test]
    fn main_camera_must_be_a_camera() {
        let mut e = engine();
        let n = e.scene_mut().create_node(NodeKind::Generic, "n", None, None).unwrap();
        assert!(matches!(e.set_main_camera(n), Err(EngineError::NotACamera(_))));
    }

    #[test]
    fn camera_far_away_culls_the_sprite() {
        let mut e = engine();
        add_red_sprite(&mut e);
        let cam = e
            .scene_mut()
            .create_node(NodeKind::Camera(Camera::default()), "cam", None, None)
            .unwrap();
        e.scene_mut().node_mut(cam).unwrap().position = Vec2::new(10000.0, 10000.0);

        e.tick(0.0, &mut ()).unwrap();
        let stats = e.tick(0.02, &mut ()).unwrap().unwrap();
        assert_eq!(stats.sprites_culled, 1);
        assert_eq!(stats.draw_calls, 0);
    }

    struct ChaseCamera;

    impl EngineHooks for ChaseCamera {
        fn update(&mut self, scene: &mut Scene, _dt: f32) {
            if let Some(cam) = scene.find_node("cam") {
                scene.node_mut(cam).unwrap().position = Vec2::new(10000.0, 10000.0);
            }
        }
    }

    #[test]
    fn camera_moved_by_a_hook_is_used_the_same_frame() {
        let mut e = engine();
        add_red_sprite(&mut e);
        e.scene_mut()
            .create_node(NodeKind::Camera(Camera::default()), "cam", None, None)
            .unwrap();

        e.tick(0.0, &mut ChaseCamera).unwrap();
        let stats = e.tick(0.02, &mut ChaseCamera).unwrap().unwrap();
        assert_eq!(stats.sprites_culled, 1);
        assert_eq!(stats.sprites_drawn, 0);
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn screen_center_maps_to_camera_position() {
        let mut e = engine();
        let cam = e
            .scene_mut()
            .create_node(NodeKind::Camera(Camera::default()), "cam", None, None)
            .unwrap();
        e.scene_mut().node_mut(cam).unwrap().position = Vec2::new(30.0, -5.0);
        let w = e.screen_to_world(400.0, 300.0).unwrap();
        assert!((w.x - 30.0).abs() < 1e-3 && (w.y + 5.0).abs() < 1e-3);
    }

    // ── gizmo overlay ─────────────────────────────────────────────────────

    #[test]
    fn gizmo_handles_are_drawn_after_the_sprites() {
        let mut e = engine();
        let id = add_red_sprite(&mut e);
        e.tick(0.0, &mut ()).unwrap();
        let stats = e.tick(0.02, &mut ()).unwrap().unwrap();
        assert_eq!(stats.overlay_lines, 0);
        assert!(e.renderer().gpu().lock().lines.is_empty());

        e.interaction_mut().gizmo.set_target(Some(id));
        let stats = e.tick(0.04, &mut ()).unwrap().unwrap();
        assert_eq!(stats.overlay_lines, 2);

        let gpu = e.renderer().gpu().lock();
        let last = gpu.lines.last().unwrap();
        assert_eq!(last.segments[0].start, [0.0, 0.0]);
        assert_eq!(last.segments[0].end, [100.0, 0.0]);
        assert_eq!(last.segments[0].color, ColorRgba::RED.to_array());
        assert_eq!(last.segments[1].end, [0.0, 100.0]);
        assert_eq!(last.segments[1].color, ColorRgba::GREEN.to_array());
    }

    #[test]
    fn removed_gizmo_target_draws_nothing() {
        let mut e = engine();
        let id = add_red_sprite(&mut e);
        e.interaction_mut().gizmo.set_target(Some(id));
        e.scene_mut().remove_node(id).unwrap();

        e.tick(0.0, &mut ()).unwrap();
        let stats = e.tick(0.02, &mut ()).unwrap().unwrap();
        assert_eq!(stats.overlay_lines, 0);
    }

    // ── input ─────────────────────────────────────────────────────────────

    #[test]
    fn clicks_reach_detecting_sprites() {
        let mut e = engine();
        let id = add_red_sprite(&mut e);
        e.scene_mut().node_mut(id).unwrap().mouse_detection = true;
        e.scene_mut().drain_events();

        e.handle_input(&InputEvent::press(MouseButton::Left, 400.0, 300.0))
            .unwrap();
        let downs: Vec<_> = e
            .scene_mut()
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, SceneEvent::Mouse(m) if m.kind == MouseEventKind::Down && m.node == id))
            .collect();
        assert_eq!(downs.len(), 1);
    }

    #[test]
    fn replacing_the_scene_resets_the_camera() {
        let mut e = engine();
        let cam = e
            .scene_mut()
            .create_node(NodeKind::Camera(Camera::default()), "cam", None, None)
            .unwrap();
        e.set_main_camera(cam).unwrap();

        let old = e.replace_scene(Scene::new("other"));
        assert_eq!(old.len(), 1);
        assert_eq!(e.main_camera(), None);
    }
}
