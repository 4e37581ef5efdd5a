use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::camera::CameraView;
use crate::coords::ColorRgba;
use crate::error::{EngineError, Result};
use crate::lighting::{gather_lights, MAX_POINT_LIGHTS};
use crate::scene::{NodeKind, Scene};

use super::batch::{collect_batches, CullStats};
use super::{
    FrameUniforms, GpuContext, GpuProgram, GpuTexture, LineSegment, ProgramId, ShaderProgram,
    TextureCache, TextureFetcher, TextureHandle, UniformContext,
};

/// A compiled program registered with the renderer.
#[derive(Debug)]
pub struct DrawCommand {
    pub program: Arc<ShaderProgram>,
    pub handle: GpuProgram,
    /// Sprites using the program as of the last [`Renderer::sync_resources`].
    refs: usize,
    /// Registered explicitly; survives having no sprites.
    pinned: bool,
}

impl DrawCommand {
    pub fn ref_count(&self) -> usize {
        self.refs
    }
}

/// What one [`Renderer::render`] call did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub sprites_considered: usize,
    pub sprites_culled: usize,
    /// Visible sprites skipped because their texture is not loaded.
    pub sprites_pending: usize,
    pub sprites_drawn: usize,
    pub draw_calls: usize,
    pub global_lights: usize,
    pub point_lights: usize,
    pub textures_released: usize,
    /// Overlay line segments submitted after the sprites.
    pub overlay_lines: usize,
}

impl FrameStats {
    fn absorb(&mut self, cull: CullStats) {
        self.sprites_considered = cull.considered;
        self.sprites_culled = cull.culled;
        self.sprites_pending = cull.pending;
        self.sprites_drawn = cull.drawn;
    }
}

/// Batches sprites by shader program and drives a [`GpuContext`].
///
/// Owns the draw-command table (one entry per distinct program id) and the
/// texture release queue. The GPU context is shared with texture caches so
/// async loads can upload without going through the renderer.
pub struct Renderer<G: GpuContext> {
    gpu: Arc<Mutex<G>>,
    commands: HashMap<ProgramId, DrawCommand>,

    release_tx: flume::Sender<GpuTexture>,
    release_rx: flume::Receiver<GpuTexture>,
    /// 1×1 white texture bound to inert light slots.
    blank: Option<TextureHandle>,

    clear_color: ColorRgba,
    frame_index: u64,
}

impl<G: GpuContext + 'static> Renderer<G> {
    pub fn new(gpu: G) -> Self {
        Self::with_shared_gpu(Arc::new(Mutex::new(gpu)))
    }

    pub fn with_shared_gpu(gpu: Arc<Mutex<G>>) -> Self {
        let (release_tx, release_rx) = flume::unbounded();
        Self {
            gpu,
            commands: HashMap::new(),
            release_tx,
            release_rx,
            blank: None,
            clear_color: ColorRgba::BLACK,
            frame_index: 0,
        }
    }

    pub fn gpu(&self) -> &Arc<Mutex<G>> {
        &self.gpu
    }

    pub fn set_clear_color(&mut self, color: ColorRgba) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> ColorRgba {
        self.clear_color
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // ── programs ──────────────────────────────────────────────────────────

    /// Compiles and registers `program` unless its id is already known.
    ///
    /// Explicit registrations are kept even when no sprite uses the program.
    pub fn register_program(&mut self, program: &Arc<ShaderProgram>) -> Result<ProgramId> {
        let id = program.id();
        self.ensure_command(program)?;
        if let Some(cmd) = self.commands.get_mut(&id) {
            cmd.pinned = true;
        }
        Ok(id)
    }

    /// Drops an explicit registration; the program is released once no
    /// sprite uses it.
    pub fn unregister_program(&mut self, id: ProgramId) {
        if let Some(cmd) = self.commands.get_mut(&id) {
            cmd.pinned = false;
            if cmd.refs == 0 {
                self.release_command(id);
            }
        }
    }

    pub fn draw_command(&self, id: ProgramId) -> Option<&DrawCommand> {
        self.commands.get(&id)
    }

    pub fn program_count(&self) -> usize {
        self.commands.len()
    }

    /// Reconciles draw commands with the sprites in `scene`.
    ///
    /// Programs gaining their first sprite are compiled; programs that lost
    /// their last sprite are released (unless pinned).
    pub fn sync_resources(&mut self, scene: &Scene) -> Result<()> {
        let mut wanted: HashMap<ProgramId, (usize, Arc<ShaderProgram>)> = HashMap::new();
        for node in scene.nodes() {
            if let NodeKind::Sprite(sprite) = &node.kind {
                wanted
                    .entry(sprite.program_id())
                    .or_insert_with(|| (0, Arc::clone(&sprite.program)))
                    .0 += 1;
            }
        }

        for (count, program) in wanted.values() {
            self.ensure_command(program)?;
            if let Some(cmd) = self.commands.get_mut(&program.id()) {
                cmd.refs = *count;
            }
        }

        let stale: Vec<ProgramId> = self
            .commands
            .iter()
            .filter(|(id, cmd)| !wanted.contains_key(id) && !cmd.pinned)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            self.release_command(id);
        }
        for (id, cmd) in self.commands.iter_mut() {
            if !wanted.contains_key(id) {
                cmd.refs = 0;
            }
        }

        Ok(())
    }

    fn ensure_command(&mut self, program: &Arc<ShaderProgram>) -> Result<()> {
        let id = program.id();
        if self.commands.contains_key(&id) {
            return Ok(());
        }

        let handle = self.gpu.lock().compile(&program.source(), &program.layout())?;
        log::debug!("compiled program {id} as {handle}");
        self.commands.insert(
            id,
            DrawCommand {
                program: Arc::clone(program),
                handle,
                refs: 0,
                pinned: false,
            },
        );
        Ok(())
    }

    fn release_command(&mut self, id: ProgramId) {
        if let Some(cmd) = self.commands.remove(&id) {
            log::debug!("released program {id} ({})", cmd.handle);
            self.gpu.lock().release_program(cmd.handle);
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads raw RGBA8 pixels as a new texture.
    pub fn create_texture(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<TextureHandle> {
        let gpu = self.gpu.lock().upload_texture(pixels, width, height)?;
        Ok(TextureHandle::new(gpu, width, height, None, self.release_tx.clone()))
    }

    /// A URL cache uploading through this renderer's GPU context.
    pub fn texture_cache(&self, fetcher: Arc<dyn TextureFetcher>) -> TextureCache<G> {
        TextureCache::new(Arc::clone(&self.gpu), fetcher, self.release_tx.clone())
    }

    /// Frees textures whose last handle was dropped. Returns how many.
    pub fn release_dropped_textures(&mut self) -> usize {
        let dropped: Vec<GpuTexture> = self.release_rx.try_iter().collect();
        if dropped.is_empty() {
            return 0;
        }
        let mut gpu = self.gpu.lock();
        for t in &dropped {
            gpu.release_texture(*t);
        }
        log::debug!("released {} texture(s)", dropped.len());
        dropped.len()
    }

    fn blank_texture(&mut self) -> Result<GpuTexture> {
        if let Some(t) = &self.blank {
            return Ok(t.gpu());
        }
        let handle = self.create_texture(&[255, 255, 255, 255], 1, 1)?;
        let id = handle.gpu();
        self.blank = Some(handle);
        Ok(id)
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Draws one frame of `scene` as seen through `view`.
    ///
    /// Every visible, on-screen, textured sprite is drawn with exactly one
    /// draw call per program. A sprite whose program was never registered
    /// aborts the frame with [`EngineError::MissingDrawCommand`].
    pub fn render(&mut self, scene: &Scene, view: &CameraView, time: f64) -> Result<FrameStats> {
        let mut stats = FrameStats {
            textures_released: self.release_dropped_textures(),
            ..Default::default()
        };
        let blank = self.blank_texture()?;

        self.gpu.lock().clear(self.clear_color, 1.0);

        let (batches, cull) = collect_batches(scene, view)?;
        stats.absorb(cull);

        let lighting = gather_lights(scene)?;
        stats.global_lights = lighting.active_globals;
        stats.point_lights = lighting.active_points;

        let mut point_textures = [blank; MAX_POINT_LIGHTS];
        for (slot, mask) in lighting.point_masks.iter().enumerate() {
            if let Some(m) = mask {
                point_textures[slot] = m.gpu();
            }
        }

        let uniform_ctx = UniformContext {
            time,
            frame_index: self.frame_index,
            view: *view,
        };
        let view_projection = view.projection_view().to_cols_array_2d();

        for batch in &batches {
            let cmd = self
                .commands
                .get(&batch.program)
                .ok_or(EngineError::MissingDrawCommand(batch.program))?;

            let frame = FrameUniforms {
                view_projection,
                globals: lighting.globals,
                points: lighting.points,
                point_textures,
                custom: cmd.program.resolve_uniforms(&uniform_ctx),
            };

            self.gpu.lock().issue_draw(cmd.handle, &frame, &batch.instances)?;
            stats.draw_calls += 1;
        }

        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(stats)
    }

    /// Draws unlit world-space lines on top of the last rendered frame.
    /// Returns how many segments were submitted.
    pub fn draw_overlay(&mut self, view: &CameraView, lines: &[LineSegment]) -> Result<usize> {
        if lines.is_empty() {
            return Ok(0);
        }
        let view_projection = view.projection_view().to_cols_array_2d();
        self.gpu.lock().draw_lines(&view_projection, lines)?;
        Ok(lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Rect, Vec2, Viewport};
    use crate::lighting::{BlendMode, Light, PointLight};
    use crate::render::{HeadlessGpu, Sprite, UniformBinding, UniformValue};
    use crate::scene::{NodeId, ZIndex};

    fn view() -> CameraView {
        CameraView::new(Vec2::ZERO, 1.0, Viewport::new(800.0, 600.0))
    }

    fn add_sprite(scene: &mut Scene, sprite: Sprite, at: Vec2) -> NodeId {
        let id = scene.create_node(NodeKind::Sprite(sprite), "sprite", None, None).unwrap();
        let n = scene.node_mut(id).unwrap();
        n.position = at;
        n.scale = Vec2::new(50.0, 50.0);
        id
    }

    fn textured(renderer: &mut Renderer<HeadlessGpu>) -> Sprite {
        let tex = renderer.create_texture(&[255; 16], 2, 2).unwrap();
        Sprite::new(tex)
    }

    // ── program dedup ─────────────────────────────────────────────────────

    #[test]
    fn identical_sources_share_one_draw_command() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");

        let a = textured(&mut r).with_program(Arc::new(ShaderProgram::new("v", "f")));
        let b = textured(&mut r).with_program(Arc::new(ShaderProgram::new("v", "f")));
        assert_eq!(a.program_id(), b.program_id());

        add_sprite(&mut scene, a, Vec2::ZERO);
        add_sprite(&mut scene, b, Vec2::new(60.0, 0.0));

        r.sync_resources(&scene).unwrap();
        assert_eq!(r.program_count(), 1);
        assert_eq!(r.gpu().lock().compile_calls, 1);

        let stats = r.render(&scene, &view(), 0.0).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.sprites_drawn, 2);
        assert_eq!(r.gpu().lock().draws[0].instances.len(), 2);
    }

    #[test]
    fn one_draw_per_program() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let custom = Arc::new(ShaderProgram::new("v2", "f2"));
        let s1 = textured(&mut r);
        let s2 = textured(&mut r).with_program(Arc::clone(&custom));
        let s3 = textured(&mut r);
        add_sprite(&mut scene, s1, Vec2::ZERO);
        add_sprite(&mut scene, s2, Vec2::ZERO);
        add_sprite(&mut scene, s3, Vec2::ZERO);

        r.sync_resources(&scene).unwrap();
        let stats = r.render(&scene, &view(), 0.0).unwrap();
        assert_eq!(stats.draw_calls, 2);
        let gpu = r.gpu().lock();
        assert_eq!(gpu.draws[0].instances.len(), 2);
        assert_eq!(gpu.draws[1].instances.len(), 1);
    }

    #[test]
    fn register_is_idempotent() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let p = Arc::new(ShaderProgram::sprite());
        let a = r.register_program(&p).unwrap();
        let b = r.register_program(&Arc::new(ShaderProgram::sprite())).unwrap();
        assert_eq!(a, b);
        assert_eq!(r.gpu().lock().compile_calls, 1);
    }

    #[test]
    fn unused_programs_are_released_on_sync() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let s = textured(&mut r);
        let id = add_sprite(&mut scene, s, Vec2::ZERO);

        r.sync_resources(&scene).unwrap();
        assert_eq!(r.program_count(), 1);
        let handle = r.draw_command(ShaderProgram::sprite().id()).unwrap().handle;

        scene.remove_node(id).unwrap();
        r.sync_resources(&scene).unwrap();
        assert_eq!(r.program_count(), 0);
        assert_eq!(r.gpu().lock().released_programs, vec![handle]);
    }

    #[test]
    fn pinned_programs_survive_sync() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let p = Arc::new(ShaderProgram::new("v", "f"));
        let id = r.register_program(&p).unwrap();
        r.sync_resources(&Scene::new("t")).unwrap();
        assert!(r.draw_command(id).is_some());
        r.unregister_program(id);
        assert!(r.draw_command(id).is_none());
    }

    #[test]
    fn unregistered_program_aborts_render() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let s = textured(&mut r);
        add_sprite(&mut scene, s, Vec2::ZERO);

        let err = r.render(&scene, &view(), 0.0);
        assert!(matches!(err, Err(EngineError::MissingDrawCommand(_))));
    }

    #[test]
    fn compile_failure_surfaces_as_gpu_error() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let err = r.register_program(&Arc::new(ShaderProgram::new("", "f")));
        assert!(matches!(err, Err(EngineError::Gpu(_))));
        assert_eq!(r.program_count(), 0);
    }

    // ── culling & textures ────────────────────────────────────────────────

    #[test]
    fn offscreen_and_pending_sprites_are_skipped() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let on = textured(&mut r);
        let far = textured(&mut r);
        add_sprite(&mut scene, on, Vec2::ZERO);
        add_sprite(&mut scene, far, Vec2::new(10000.0, 10000.0));
        add_sprite(&mut scene, Sprite::from_url("later.png"), Vec2::ZERO);
        let hidden = textured(&mut r);
        let h = add_sprite(&mut scene, hidden, Vec2::ZERO);
        scene.node_mut(h).unwrap().visible = false;

        r.sync_resources(&scene).unwrap();
        let stats = r.render(&scene, &view(), 0.0).unwrap();
        assert_eq!(stats.sprites_considered, 3);
        assert_eq!(stats.sprites_culled, 1);
        assert_eq!(stats.sprites_pending, 1);
        assert_eq!(stats.sprites_drawn, 1);
        assert_eq!(stats.draw_calls, 1);
    }

    #[test]
    fn nothing_to_draw_still_clears() {
        let mut r = Renderer::new(HeadlessGpu::new());
        r.set_clear_color(ColorRgba::BLUE);
        let stats = r.render(&Scene::new("t"), &view(), 0.0).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(r.gpu().lock().clears, vec![(ColorRgba::BLUE, 1.0)]);
    }

    #[test]
    fn dropped_textures_are_released_next_frame() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let s = textured(&mut r);
        let tex = s.texture.as_ref().unwrap().gpu();
        let id = add_sprite(&mut scene, s, Vec2::ZERO);

        r.sync_resources(&scene).unwrap();
        r.render(&scene, &view(), 0.0).unwrap();
        assert!(r.gpu().lock().texture_size(tex).is_some());

        scene.remove_node(id).unwrap();
        r.sync_resources(&scene).unwrap();
        let stats = r.render(&scene, &view(), 0.0).unwrap();
        assert_eq!(stats.textures_released, 1);
        assert!(r.gpu().lock().released_textures.contains(&tex));
    }

    #[test]
    fn shared_texture_outlives_one_sprite() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let tex = r.create_texture(&[0; 4], 1, 1).unwrap();
        let a = add_sprite(&mut scene, Sprite::new(tex.clone()), Vec2::ZERO);
        add_sprite(&mut scene, Sprite::new(tex.clone()), Vec2::ZERO);
        drop(tex);

        scene.remove_node(a).unwrap();
        r.sync_resources(&scene).unwrap();
        let stats = r.render(&scene, &view(), 0.0).unwrap();
        assert_eq!(stats.textures_released, 0);
        assert_eq!(stats.sprites_drawn, 1);
    }

    #[test]
    fn batch_is_ordered_by_z_then_traversal() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let front = textured(&mut r).with_z(ZIndex(5)).with_tint(ColorRgba::RED);
        let back = textured(&mut r).with_tint(ColorRgba::GREEN);
        add_sprite(&mut scene, front, Vec2::ZERO);
        add_sprite(&mut scene, back, Vec2::ZERO);

        r.sync_resources(&scene).unwrap();
        r.render(&scene, &view(), 0.0).unwrap();
        let gpu = r.gpu().lock();
        let tints: Vec<_> = gpu.draws[0].instances.iter().map(|i| i.tint).collect();
        assert_eq!(tints, vec![ColorRgba::GREEN.to_array(), ColorRgba::RED.to_array()]);
    }

    #[test]
    fn instance_carries_source_rect_and_model() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let s = textured(&mut r).with_source_rect(Rect::new(0.5, 0.0, 0.5, 1.0));
        add_sprite(&mut scene, s, Vec2::new(10.0, 20.0));

        r.sync_resources(&scene).unwrap();
        r.render(&scene, &view(), 0.0).unwrap();
        let gpu = r.gpu().lock();
        let inst = gpu.draws[0].instances[0];
        assert_eq!(inst.source_rect, [0.5, 0.0, 0.5, 1.0]);
        assert_eq!(inst.model[3][0], 10.0);
        assert_eq!(inst.model[3][1], 20.0);
        assert_eq!(inst.model[0][0], 50.0);
    }

    // ── lighting ──────────────────────────────────────────────────────────

    #[test]
    fn inert_light_slots_bind_the_blank_texture() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let s = textured(&mut r);
        add_sprite(&mut scene, s, Vec2::ZERO);
        scene
            .create_node(
                NodeKind::GlobalLight(Light::new(ColorRgba::WHITE, 0.3, BlendMode::Mix)),
                "sun",
                None,
                None,
            )
            .unwrap();
        let mask = r.create_texture(&[255; 4], 1, 1).unwrap();
        let mask_id = mask.gpu();
        scene
            .create_node(
                NodeKind::PointLight(PointLight::new(Light::default()).with_texture(mask)),
                "lamp",
                None,
                None,
            )
            .unwrap();

        r.sync_resources(&scene).unwrap();
        let stats = r.render(&scene, &view(), 0.0).unwrap();
        assert_eq!(stats.global_lights, 1);
        assert_eq!(stats.point_lights, 1);

        let gpu = r.gpu().lock();
        let frame = &gpu.draws[0].frame;
        assert_eq!(frame.globals[1].intensity(), 0.0);
        assert_eq!(frame.points[1].intensity(), 0.0);
        assert_eq!(frame.point_textures[0], mask_id);
        assert_ne!(frame.point_textures[1], mask_id);
        assert_eq!(gpu.texture_size(frame.point_textures[1]), Some((1, 1)));
    }

    #[test]
    fn per_draw_uniforms_are_resolved_each_frame() {
        let mut r = Renderer::new(HeadlessGpu::new());
        let mut scene = Scene::new("t");
        let program = Arc::new(
            ShaderProgram::new("v", "f")
                .with_uniform("time", UniformBinding::per_draw(|c| UniformValue::Float(c.time as f32))),
        );
        let s = textured(&mut r).with_program(program);
        add_sprite(&mut scene, s, Vec2::ZERO);

        r.sync_resources(&scene).unwrap();
        r.render(&scene, &view(), 2.5).unwrap();
        let gpu = r.gpu().lock();
        assert_eq!(gpu.draws[0].frame.custom, vec![("time".to_string(), UniformValue::Float(2.5))]);
    }

    // ── overlay ───────────────────────────────────────────────────────────

    #[test]
    fn overlay_lines_follow_the_sprite_draws() {
        let mut scene = Scene::new("t");
        let mut r = Renderer::new(HeadlessGpu::new());
        let sprite = textured(&mut r);
        add_sprite(&mut scene, sprite, Vec2::ZERO);
        r.sync_resources(&scene).unwrap();
        r.render(&scene, &view(), 0.0).unwrap();

        let line = LineSegment {
            start: [0.0, 0.0],
            end: [100.0, 0.0],
            color: ColorRgba::RED.to_array(),
        };
        assert_eq!(r.draw_overlay(&view(), &[line]).unwrap(), 1);
        assert_eq!(r.draw_overlay(&view(), &[]).unwrap(), 0);

        let gpu = r.gpu().lock();
        assert_eq!(gpu.draws.len(), 1);
        assert_eq!(gpu.lines.len(), 1);
        assert_eq!(gpu.lines[0].segments, vec![line]);
        assert_eq!(
            gpu.lines[0].view_projection,
            view().projection_view().to_cols_array_2d()
        );
    }
}
