// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! RGB color value shared by the animator, the state palette and the API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 8-bit RGB triple. Serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation toward `target` at `step / steps`.
    ///
    /// Each channel is `self + (target - self) * (step / steps)` truncated to an
    /// integer. `step >= steps` (or `steps == 0`) yields `target` exactly.
    pub fn lerp(self, target: Rgb, step: u32, steps: u32) -> Rgb {
        if steps == 0 || step >= steps {
            return target;
        }
        let t = f64::from(step) / f64::from(steps);
        let channel = |from: u8, to: u8| -> u8 {
            let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
            value as u8
        };
        Rgb::new(
            channel(self.r, target.r),
            channel(self.g, target.g),
            channel(self.b, target.b),
        )
    }

    /// Multiply every channel by `factor`, clamped to 0..=255.
    pub fn scale(self, factor: f64) -> Rgb {
        let channel = |c: u8| (f64::from(c) * factor).clamp(0.0, 255.0) as u8;
        Rgb::new(channel(self.r), channel(self.g), channel(self.b))
    }

    /// Apply a 0-255 global brightness (255 = unchanged).
    pub fn with_brightness(self, brightness: u8) -> Rgb {
        if brightness == u8::MAX {
            return self;
        }
        let channel = |c: u8| ((u16::from(c) * u16::from(brightness)) / 255) as u8;
        Rgb::new(channel(self.r), channel(self.g), channel(self.b))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(value: [u8; 3]) -> Self {
        Rgb::new(value[0], value[1], value[2])
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(value: Rgb) -> Self {
        [value.r, value.g, value.b]
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_truncates_toward_start() {
        let from = Rgb::new(255, 0, 0);
        let to = Rgb::new(0, 0, 255);
        assert_eq!(from.lerp(to, 0, 2), from);
        // 255 - 127.5 = 127.5 -> 127, 0 + 127.5 -> 127
        assert_eq!(from.lerp(to, 1, 2), Rgb::new(127, 0, 127));
        assert_eq!(from.lerp(to, 2, 2), to);
    }

    #[test]
    fn lerp_with_zero_steps_is_target() {
        assert_eq!(Rgb::BLACK.lerp(Rgb::new(1, 2, 3), 0, 0), Rgb::new(1, 2, 3));
    }

    #[test]
    fn brightness_scaling() {
        let c = Rgb::new(255, 100, 0);
        assert_eq!(c.with_brightness(255), c);
        assert_eq!(c.with_brightness(0), Rgb::BLACK);
        assert_eq!(c.with_brightness(100), Rgb::new(100, 39, 0));
    }

    #[test]
    fn scale_clamps() {
        assert_eq!(Rgb::new(200, 10, 0).scale(1.5), Rgb::new(255, 15, 0));
        assert_eq!(Rgb::new(200, 10, 0).scale(-1.0), Rgb::BLACK);
    }

    #[test]
    fn serializes_as_array() {
        let json = serde_json::to_string(&Rgb::new(255, 255, 0)).unwrap();
        assert_eq!(json, "[255,255,0]");
        let back: Rgb = serde_json::from_str("[0,0,255]").unwrap();
        assert_eq!(back, Rgb::new(0, 0, 255));
    }
}
