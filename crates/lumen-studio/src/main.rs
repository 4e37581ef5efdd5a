use anyhow::Result;

use lumen_engine::camera::Camera;
use lumen_engine::coords::{ColorRgba, Vec2};
use lumen_engine::device::GpuInit;
use lumen_engine::input::InputEvent;
use lumen_engine::interaction::InputOutcome;
use lumen_engine::lighting::{BlendMode, Light, PointLight};
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::render::{FrameStats, Sprite, WgpuContext};
use lumen_engine::scene::{NodeId, NodeKind, Scene};
use lumen_engine::window::{App, AppControl, Runtime, RuntimeConfig};
use lumen_engine::{Engine, EngineHooks};

/// Radians per second.
const SPIN_SPEED: f32 = 0.6;

/// Demo scene: one tinted square, a dim ambient light, a warm point light and
/// a camera. The square spins slowly; drag its gizmo handles to move it,
/// middle-drag to pan and scroll to zoom.
#[derive(Default)]
struct Studio {
    square: Option<NodeId>,
    frames: u64,
}

impl EngineHooks for Studio {
    fn update(&mut self, scene: &mut Scene, dt: f32) {
        let Some(id) = self.square else { return };
        if let Some(node) = scene.node_mut(id) {
            node.rotation = (node.rotation + SPIN_SPEED * dt) % std::f32::consts::TAU;
        }
    }
}

impl App for Studio {
    fn setup(&mut self, engine: &mut Engine<WgpuContext>) -> Result<()> {
        let pixels: Vec<u8> = std::iter::repeat([220u8, 40, 40, 255])
            .take(50 * 50)
            .flatten()
            .collect();
        let texture = engine.renderer_mut().create_texture(&pixels, 50, 50)?;

        let scene = engine.scene_mut();

        let camera = scene.create_node(NodeKind::Camera(Camera::default()), "main camera", None, None)?;

        let square = scene.create_node(NodeKind::Sprite(Sprite::new(texture)), "square", None, None)?;
        {
            let node = scene.get_mut(square)?;
            node.scale = Vec2::new(50.0, 50.0);
            node.mouse_detection = true;
        }

        scene.create_node(
            NodeKind::GlobalLight(Light::new(ColorRgba::WHITE, 0.35, BlendMode::Mix)),
            "ambient",
            None,
            None,
        )?;

        let lamp = scene.create_node(
            NodeKind::PointLight(PointLight::new(Light::new(
                ColorRgba::new(1.0, 0.85, 0.6, 1.0),
                1.2,
                BlendMode::Add,
            ))),
            "lamp",
            None,
            None,
        )?;
        {
            let node = scene.get_mut(lamp)?;
            node.position = Vec2::new(40.0, -30.0);
            node.scale = Vec2::new(160.0, 160.0);
        }

        engine.set_main_camera(camera)?;
        engine.interaction_mut().gizmo.set_target(Some(square));
        self.square = Some(square);

        log::info!("studio scene ready: {} nodes", engine.scene().len());
        Ok(())
    }

    fn on_input(
        &mut self,
        engine: &mut Engine<WgpuContext>,
        _event: &InputEvent,
        outcome: InputOutcome,
    ) -> AppControl {
        if let InputOutcome::Scene(Some(hit)) = outcome {
            let name = engine.scene().node(hit).map(|n| n.name().to_string());
            log::info!("picked {hit} ({})", name.unwrap_or_default());
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, _engine: &mut Engine<WgpuContext>, stats: Option<FrameStats>) -> AppControl {
        self.frames += 1;
        if self.frames % 600 != 0 {
            return AppControl::Continue;
        }
        if let Some(stats) = stats {
            log::debug!(
                "frame {}: {} drawn, {} culled, {} draw call(s)",
                self.frames,
                stats.sprites_drawn,
                stats.sprites_culled,
                stats.draw_calls
            );
        }
        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "Lumen Studio".to_string(),
        ..Default::default()
    };

    Runtime::run(config, GpuInit::default(), Studio::default())
}
