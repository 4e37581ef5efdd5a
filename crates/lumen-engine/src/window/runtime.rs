use std::time::Instant;

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::EngineConfig;
use crate::coords::Rect;
use crate::device::{Gpu, GpuInit, SurfaceErrorAction};
use crate::engine::{Engine, EngineHooks};
use crate::input::platform::winit::translate_window_event;
use crate::input::InputEvent;
use crate::interaction::InputOutcome;
use crate::render::{FrameStats, RenderTarget, WgpuContext};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub engine: EngineConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            engine: EngineConfig::default(),
        }
    }
}

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime`].
///
/// The engine hooks run inside every tick; the methods below run around it.
pub trait App: EngineHooks {
    /// Called once the window and GPU exist, before the first frame.
    fn setup(&mut self, engine: &mut Engine<WgpuContext>) -> Result<()>;

    /// Called after the engine routed an input event.
    fn on_input(
        &mut self,
        engine: &mut Engine<WgpuContext>,
        event: &InputEvent,
        outcome: InputOutcome,
    ) -> AppControl {
        let _ = (engine, event, outcome);
        AppControl::Continue
    }

    /// Called after each rendered frame.
    fn on_frame(&mut self, engine: &mut Engine<WgpuContext>, stats: Option<FrameStats>) -> AppControl {
        let _ = (engine, stats);
        AppControl::Continue
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A: App + 'static> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    window: Option<WindowEntry>,
    engine: Option<Engine<WgpuContext>>,
    started: Instant,

    exit_requested: bool,
    fatal: Option<anyhow::Error>,
}

impl<A: App + 'static> AppState<A> {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            window: None,
            engine: None,
            started: Instant::now(),
            exit_requested: false,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        let backend = entry.with_gpu(|gpu| {
            WgpuContext::new(gpu.device().clone(), gpu.queue().clone(), gpu.surface_format())
        });
        let mut engine = Engine::new(backend, self.config.engine.clone());
        engine.resize(entry.with_window(|w| canvas_of(w)));

        self.app
            .setup(&mut engine)
            .context("application setup failed")?;

        log::info!("window ready: '{}'", self.config.title);
        entry.with_window(|w| w.request_redraw());
        self.window = Some(entry);
        self.engine = Some(engine);
        self.started = Instant::now();
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(entry), Some(engine)) = (self.window.as_mut(), self.engine.as_mut()) else {
            return;
        };
        let now = self.started.elapsed().as_secs_f64();
        let app = &mut self.app;

        let mut control = AppControl::Continue;
        let mut fatal = None;

        entry.with_mut(|fields| {
            let mut frame = match fields.gpu.begin_frame() {
                Ok(f) => f,
                Err(err) => {
                    log::warn!("surface error: {err}");
                    if fields.gpu.handle_surface_error(err) == SurfaceErrorAction::Fatal {
                        fatal = Some(anyhow::anyhow!("unrecoverable surface error"));
                    }
                    return;
                }
            };

            let stats = match engine.tick(now, app) {
                Ok(stats) => stats,
                Err(e) => {
                    log::error!("frame failed: {e}");
                    None
                }
            };

            {
                let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
                engine.renderer().gpu().lock().encode(&mut target);
            }

            fields.window.pre_present_notify();
            fields.gpu.submit(frame);

            control = app.on_frame(engine, stats);
        });

        if let Some(e) = fatal {
            self.fail(event_loop, e);
            return;
        }
        if control == AppControl::Exit {
            self.exit_requested = true;
        }
    }
}

impl<A: App + 'static> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw.
        if let Some(entry) = self.window.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if let (Some(entry), Some(engine)) = (self.window.as_ref(), self.engine.as_mut()) {
            let input = entry.with_window(|w| translate_window_event(w, engine.interaction().input(), &event));
            if let Some(ev) = input {
                let outcome = match engine.handle_input(&ev) {
                    Ok(o) => o,
                    Err(e) => {
                        log::warn!("input dropped: {e}");
                        InputOutcome::Ignored
                    }
                };
                if self.app.on_input(engine, &ev, outcome) == AppControl::Exit {
                    self.exit_requested = true;
                }
            }
        }

        match &event {
            WindowEvent::CloseRequested => {
                log::info!("close requested");
                self.exit_requested = true;
                self.engine = None;
                self.window = None;
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.window.as_mut() {
                    entry.with_gpu_mut(|gpu| gpu.resize(*new_size));
                    let canvas = entry.with_window(|w| {
                        w.request_redraw();
                        canvas_of(w)
                    });
                    if let Some(engine) = self.engine.as_mut() {
                        engine.resize(canvas);
                    }
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.window.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                    let canvas = entry.with_window(|w| canvas_of(w));
                    if let Some(engine) = self.engine.as_mut() {
                        engine.resize(canvas);
                    }
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}

/// Canvas rectangle in logical pixels: the whole client area.
fn canvas_of(window: &Window) -> Rect {
    let logical: LogicalSize<f64> = window.inner_size().to_logical(window.scale_factor());
    Rect::new(0.0, 0.0, logical.width as f32, logical.height as f32)
}
