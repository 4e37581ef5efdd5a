//! Fixed-step frame clock.
//!
//! The host calls [`Clock::tick`] once per display refresh with a monotonic
//! timestamp in seconds. The clock drains accumulated time in fixed steps and
//! then runs one variable update and one render.

mod clock;

pub use clock::{Clock, FrameHandler, DEFAULT_FIXED_DELTA, DEFAULT_MAX_STEPS};
