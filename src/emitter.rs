//! Autonomous idle motion.
//!
//! A Lissajous path around the surface centre emits low-amplitude splats so
//! the effect keeps moving without any input. The driver is independent of
//! the pointer driver and can be disabled on its own (`idle: None`).
//!
//! The path is `c + A·(sin(3ωt + π/2), sin(2ωt))`; the splat impulse follows
//! the path's tangent, so the ink is dragged along the curve.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;

use crate::config::{IdleMotion, SimulationConfig};
use crate::splat::SplatCommand;
use crate::visuals::Palette;

const FREQ_X: f32 = 3.0;
const FREQ_Y: f32 = 2.0;

/// Emits splats along a time-driven path.
#[derive(Debug)]
pub struct IdleDriver {
    motion: IdleMotion,
    radius: f32,
    /// Elapsed time of the last emitted splat.
    last_emit: Option<f32>,
}

impl IdleDriver {
    /// `None` when the config disables idle motion.
    pub fn new(config: &SimulationConfig) -> Option<Self> {
        config.idle.map(|motion| Self {
            motion,
            radius: config.splat_radius,
            last_emit: None,
        })
    }

    /// Path position at `elapsed` seconds, in normalized surface coordinates.
    pub fn position_at(&self, elapsed: f32) -> Vec2 {
        let phase = elapsed * self.motion.speed;
        Vec2::splat(0.5)
            + self.motion.amplitude * Vec2::new((FREQ_X * phase + FRAC_PI_2).sin(), (FREQ_Y * phase).sin())
    }

    /// Path tangent at `elapsed`, in surface fractions per second.
    fn velocity_at(&self, elapsed: f32) -> Vec2 {
        let phase = elapsed * self.motion.speed;
        self.motion.amplitude
            * self.motion.speed
            * Vec2::new(
                FREQ_X * (FREQ_X * phase + FRAC_PI_2).cos(),
                FREQ_Y * (FREQ_Y * phase).cos(),
            )
    }

    /// Advance to `elapsed` seconds since start. Emits at most one splat.
    pub fn tick(&mut self, elapsed: f32, palette: &Palette) -> Option<SplatCommand> {
        if let Some(last) = self.last_emit {
            if elapsed < last {
                // Clock restarted.
                self.last_emit = None;
            } else if elapsed - last < self.motion.interval || elapsed == last {
                return None;
            }
        }
        self.last_emit = Some(elapsed);

        let position = self.position_at(elapsed);
        let impulse = self.velocity_at(elapsed) * self.motion.force;
        let blend = 0.5 + 0.5 * (elapsed * 0.3).sin();
        let color = palette.color_at(blend) * self.motion.intensity;
        Some(SplatCommand::new(position, impulse, color, self.radius))
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(interval: f32) -> IdleDriver {
        let config = SimulationConfig {
            idle: Some(IdleMotion {
                interval,
                ..IdleMotion::default()
            }),
            ..SimulationConfig::ink()
        };
        IdleDriver::new(&config).unwrap()
    }

    #[test]
    fn test_disabled_by_config() {
        assert!(IdleDriver::new(&SimulationConfig::vivid()).is_none());
    }

    #[test]
    fn test_path_stays_inside_surface() {
        let idle = driver(0.0);
        for i in 0..1000 {
            let p = idle.position_at(i as f32 * 0.05);
            assert!(p.x > 0.0 && p.x < 1.0 && p.y > 0.0 && p.y < 1.0, "{p:?}");
        }
    }

    #[test]
    fn test_emits_once_per_tick() {
        let mut idle = driver(0.0);
        let palette = Palette::default();
        assert!(idle.tick(0.016, &palette).is_some());
        assert!(idle.tick(0.016, &palette).is_none(), "same timestamp twice");
        assert!(idle.tick(0.032, &palette).is_some());
    }

    #[test]
    fn test_interval_throttles() {
        let mut idle = driver(0.1);
        let palette = Palette::default();
        let emitted = (1..=60).filter(|i| idle.tick(*i as f32 / 60.0, &palette).is_some()).count();
        assert!((9..=11).contains(&emitted), "emitted {emitted}");
    }

    #[test]
    fn test_impulse_follows_tangent() {
        let mut idle = driver(0.0);
        let t = 1.3;
        let splat = idle.tick(t, &Palette::default()).unwrap();
        let ahead = idle.position_at(t + 1e-3) - idle.position_at(t);
        assert!(splat.impulse.dot(ahead) > 0.0);
    }
}
