use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Camera node payload.
///
/// `zoom = 1 / distance`; the distance is always positive and finite.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    distance: f32,
}

impl Camera {
    pub fn new(distance: f32) -> Result<Self> {
        let mut c = Camera::default();
        c.set_distance(distance)?;
        Ok(c)
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        1.0 / self.distance
    }

    pub fn set_distance(&mut self, distance: f32) -> Result<()> {
        if !(distance.is_finite() && distance > 0.0) {
            return Err(EngineError::InvalidCameraDistance(distance));
        }
        self.distance = distance;
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<()> {
        if !(zoom.is_finite() && zoom > 0.0) {
            return Err(EngineError::InvalidCameraDistance(1.0 / zoom));
        }
        self.set_distance(1.0 / zoom)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self { distance: 1.0 }
    }
}
