use serde::{Deserialize, Serialize};

/// How a light's color combines with the surface color.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Add,
    Subtract,
    Mix,
}

impl BlendMode {
    /// Numeric code shared with the shaders.
    pub const fn code(self) -> u32 {
        match self {
            BlendMode::Add => 0,
            BlendMode::Subtract => 1,
            BlendMode::Mix => 2,
        }
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(BlendMode::Add),
            1 => Some(BlendMode::Subtract),
            2 => Some(BlendMode::Mix),
            _ => None,
        }
    }

    /// Blends `light` into `color` by `amount`, clamped to `[0, 1]`.
    pub fn apply(self, color: [f32; 3], light: [f32; 3], amount: f32) -> [f32; 3] {
        let mut out = [0.0; 3];
        for i in 0..3 {
            let v = match self {
                BlendMode::Add => color[i] + light[i] * amount,
                BlendMode::Subtract => color[i] - light[i] * amount,
                BlendMode::Mix => color[i] + (light[i] - color[i]) * amount,
            };
            out[i] = v.clamp(0.0, 1.0);
        }
        out
    }
}
