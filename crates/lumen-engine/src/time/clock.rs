/// Default fixed simulation step: 60 Hz.
pub const DEFAULT_FIXED_DELTA: f64 = 1.0 / 60.0;

/// Default cap on fixed steps drained by a single tick.
pub const DEFAULT_MAX_STEPS: u32 = 8;

/// Callbacks driven by [`Clock::tick`].
///
/// Every method has an empty default so handlers only implement what they need.
pub trait FrameHandler {
    /// Called zero or more times per tick with the fixed delta.
    fn fixed_update(&mut self, _dt: f32) {}

    /// Called once per tick with the real elapsed time.
    fn update(&mut self, _dt: f32) {}

    /// Called once per tick after `update`.
    fn render(&mut self, _dt: f32) {}
}

/// Fixed-step accumulator clock.
///
/// Owned by the engine; there is no global instance. Timestamps are plain
/// seconds so tests can drive the clock deterministically.
#[derive(Debug, Clone)]
pub struct Clock {
    fixed_delta: f64,
    max_steps_per_tick: u32,

    last: Option<f64>,
    accumulator: f64,
    delta_time: f64,
    frame_index: u64,

    fps: f64,
    fps_frames: u32,
    fps_elapsed: f64,
}

impl Clock {
    /// Creates a clock draining `fixed_delta` seconds per fixed step.
    ///
    /// Non-positive or non-finite values fall back to [`DEFAULT_FIXED_DELTA`].
    pub fn new(fixed_delta: f64) -> Self {
        let fixed_delta = if fixed_delta.is_finite() && fixed_delta > 0.0 {
            fixed_delta
        } else {
            log::warn!("invalid fixed delta {fixed_delta}, using {DEFAULT_FIXED_DELTA}");
            DEFAULT_FIXED_DELTA
        };

        Self {
            fixed_delta,
            max_steps_per_tick: DEFAULT_MAX_STEPS,
            last: None,
            accumulator: 0.0,
            delta_time: 0.0,
            frame_index: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_elapsed: 0.0,
        }
    }

    /// Caps the number of fixed steps per tick. `0` removes the cap.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps_per_tick = max_steps;
        self
    }

    pub fn fixed_delta(&self) -> f64 {
        self.fixed_delta
    }

    /// Real time elapsed between the two most recent ticks.
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Frames per second, recomputed once per elapsed second.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Number of ticks that ran handlers.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Time accumulated but not yet drained by a fixed step.
    pub fn accumulated(&self) -> f64 {
        self.accumulator
    }

    /// Forgets the baseline; the next tick only records a timestamp again.
    ///
    /// Used after the host was suspended.
    pub fn reset(&mut self) {
        self.last = None;
        self.accumulator = 0.0;
    }

    /// Advances the clock to `now` (seconds) and drives `handler`.
    ///
    /// The first tick only records the baseline and calls nothing. Returns the
    /// number of fixed steps that ran.
    pub fn tick<H: FrameHandler + ?Sized>(&mut self, now: f64, handler: &mut H) -> u32 {
        let Some(last) = self.last else {
            self.last = Some(now);
            return 0;
        };

        let mut delta = now - last;
        if !delta.is_finite() || delta < 0.0 {
            delta = 0.0;
        }
        self.last = Some(now);

        self.delta_time = delta;
        self.accumulator += delta;

        self.fps_frames += 1;
        self.fps_elapsed += delta;
        if self.fps_elapsed >= 1.0 {
            self.fps = f64::from(self.fps_frames) / self.fps_elapsed;
            self.fps_frames = 0;
            self.fps_elapsed = 0.0;
        }

        let mut steps = 0u32;
        while self.accumulator >= self.fixed_delta {
            if self.max_steps_per_tick != 0 && steps == self.max_steps_per_tick {
                log::warn!(
                    "clock fell behind: dropping {:.3}s after {} fixed steps",
                    self.accumulator,
                    steps
                );
                self.accumulator %= self.fixed_delta;
                break;
            }
            handler.fixed_update(self.fixed_delta as f32);
            self.accumulator -= self.fixed_delta;
            steps += 1;
        }

        handler.update(delta as f32);
        handler.render(delta as f32);

        self.frame_index = self.frame_index.wrapping_add(1);
        steps
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_DELTA)
    }
}
