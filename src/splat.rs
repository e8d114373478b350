//! Splat commands: localized impulse and colour injections.

use glam::{Vec2, Vec3};

/// One Gaussian impulse, consumed once by the splat stage.
///
/// `position` is in normalized surface coordinates (origin top-left, y down),
/// `impulse` is in simulation texels per second along the same axes, and
/// `radius` is the Gaussian width as a fraction of the surface height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplatCommand {
    pub position: Vec2,
    pub impulse: Vec2,
    pub color: Vec3,
    pub radius: f32,
}

impl SplatCommand {
    pub fn new(position: Vec2, impulse: Vec2, color: Vec3, radius: f32) -> Self {
        Self {
            position,
            impulse,
            color,
            radius,
        }
    }

    /// Gaussian weight of this splat at `uv` on a grid with the given aspect ratio.
    pub fn weight_at(&self, uv: Vec2, aspect: f32) -> f32 {
        let mut p = uv - self.position;
        p.x *= aspect;
        let r2 = (self.radius * self.radius).max(1e-8);
        (-p.length_squared() / r2).exp()
    }
}

/// Splats accumulated between two frames, applied in arrival order.
#[derive(Debug, Default)]
pub struct SplatQueue {
    pending: Vec<SplatCommand>,
}

impl SplatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, splat: SplatCommand) {
        self.pending.push(splat);
    }

    /// Take every pending splat, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<SplatCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
