//! 2D positions and the straight-line navigation primitive.
//!
//! Movement is not path planning: a drone flies directly at its target and
//! snaps onto it once the remaining distance fits inside one step.

use serde::{Deserialize, Serialize};

/// 2D position vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    /// True when `other` lies within `threshold` of this point.
    pub fn is_near(&self, other: &Self, threshold: f32) -> bool {
        self.distance_squared(other) < threshold * threshold
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

/// Result of advancing toward a target for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub position: Vec2,
    /// Distance actually covered this step.
    pub travelled: f32,
    /// True when the position snapped onto the target.
    pub reached: bool,
}

/// Advance `from` toward `to` by at most `step` units.
pub fn step_toward(from: Vec2, to: Vec2, step: f32) -> StepResult {
    let diff = to - from;
    let distance = diff.length();

    if step >= distance {
        return StepResult {
            position: to,
            travelled: distance,
            reached: true,
        };
    }

    let step = step.max(0.0);
    StepResult {
        position: from + diff.normalize() * step,
        travelled: step,
        reached: false,
    }
}

/// Clamp a point into the square service area `[0, size]²`.
pub fn clamp_to_grid(point: Vec2, size: f32) -> Vec2 {
    Vec2::new(point.x.clamp(0.0, size), point.y.clamp(0.0, size))
}
