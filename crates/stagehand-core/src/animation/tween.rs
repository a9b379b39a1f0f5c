//! Scalar tweens and easing curves.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    SineIn,
    SineOut,
    SineInOut,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::SineIn => 1.0 - (t * PI / 2.0).cos(),
            Easing::SineOut => (t * PI / 2.0).sin(),
            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Interpolates one numeric property between two bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    easing: Easing,
    from: f32,
    to: f32,
    value: f32,
    enabled: bool,
}

impl Tween {
    pub fn new(easing: Easing, from: f32, to: f32) -> Self {
        Self {
            easing,
            from,
            to,
            value: from,
            enabled: true,
        }
    }

    pub fn set_range(&mut self, from: f32, to: f32) {
        self.from = from;
        self.to = to;
        self.value = from;
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn to(&self) -> f32 {
        self.to
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Recompute the value for `progress` and return it.
    pub fn update(&mut self, progress: f32) -> f32 {
        self.value = self.from + (self.to - self.from) * self.easing.apply(progress);
        self.value
    }
}
