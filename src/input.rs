//! Pointer input to splat conversion.
//!
//! The driver only ever sees raw `(x, y, dx, dy)` in surface pixels. It never
//! touches GPU resources: it returns a [`SplatCommand`] that the engine queues
//! for the next frame's splat stage.
//!
//! # Usage
//!
//! ```ignore
//! let mut pointer = PointerDriver::new(&config);
//! if let Some(splat) = pointer.on_pointer_move(x, y, dx, dy, surface, &palette) {
//!     queue.push(splat);
//! }
//! ```

use glam::Vec2;
use winit::event::WindowEvent;

use crate::config::SimulationConfig;
use crate::field::GridSize;
use crate::splat::SplatCommand;
use crate::visuals::Palette;

/// Converts pointer movement into splats.
#[derive(Debug)]
pub struct PointerDriver {
    enabled: bool,
    force: f32,
    radius: f32,
    intensity: f32,
    /// Advances once per emitted splat so consecutive splats vary in colour.
    seed: u32,
    /// Last cursor position in pixels, for hosts that only report positions.
    last_position: Option<Vec2>,
}

impl PointerDriver {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            enabled: config.pointer_splats,
            force: config.splat_force,
            radius: config.splat_radius,
            intensity: config.splat_intensity,
            seed: 0,
            last_position: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// One reported pointer movement.
    ///
    /// `x`, `y` and the deltas are in surface pixels, origin top-left. Returns
    /// `None` when the pointer is outside the surface, when it did not move, or
    /// when pointer splats are disabled.
    pub fn on_pointer_move(
        &mut self,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        surface: GridSize,
        palette: &Palette,
    ) -> Option<SplatCommand> {
        if !self.enabled {
            return None;
        }
        let (w, h) = (surface.width as f32, surface.height as f32);
        if !(0.0..w).contains(&x) || !(0.0..h).contains(&y) {
            return None;
        }
        if dx == 0.0 && dy == 0.0 {
            return None;
        }

        let position = Vec2::new(x / w, y / h);
        let impulse = Vec2::new(dx / w, dy / h) * self.force;
        self.seed = self.seed.wrapping_add(1);
        let color = palette.pick(self.seed, self.intensity);
        Some(SplatCommand::new(position, impulse, color, self.radius))
    }

    /// Process a winit window event, deriving deltas from consecutive
    /// cursor positions.
    pub fn handle_event(&mut self, event: &WindowEvent, surface: GridSize, palette: &Palette) -> Option<SplatCommand> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let pos = Vec2::new(position.x as f32, position.y as f32);
                let previous = self.last_position.replace(pos);
                let delta = pos - previous?;
                self.on_pointer_move(pos.x, pos.y, delta.x, delta.y, surface, palette)
            }
            WindowEvent::CursorLeft { .. } => {
                self.last_position = None;
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> PointerDriver {
        PointerDriver::new(&SimulationConfig::ink())
    }

    #[test]
    fn test_move_inside_surface_emits_splat() {
        let mut pointer = driver();
        let surface = GridSize::new(800, 600);
        let splat = pointer
            .on_pointer_move(400.0, 300.0, 8.0, 0.0, surface, &Palette::default())
            .unwrap();
        assert_eq!(splat.position, Vec2::new(0.5, 0.5));
        assert!(splat.impulse.x > 0.0);
        assert_eq!(splat.impulse.y, 0.0);
        assert_eq!(splat.radius, SimulationConfig::ink().splat_radius);
    }

    #[test]
    fn test_move_outside_surface_is_ignored() {
        let mut pointer = driver();
        let surface = GridSize::new(800, 600);
        let palette = Palette::default();
        assert!(pointer.on_pointer_move(-1.0, 10.0, 4.0, 4.0, surface, &palette).is_none());
        assert!(pointer.on_pointer_move(10.0, 600.0, 4.0, 4.0, surface, &palette).is_none());
    }

    #[test]
    fn test_zero_delta_is_ignored() {
        let mut pointer = driver();
        let splat = pointer.on_pointer_move(10.0, 10.0, 0.0, 0.0, GridSize::new(100, 100), &Palette::default());
        assert!(splat.is_none());
    }

    #[test]
    fn test_disabled_driver_emits_nothing() {
        let mut pointer = PointerDriver::new(&SimulationConfig::calm());
        assert!(!pointer.is_enabled());
        let splat = pointer.on_pointer_move(10.0, 10.0, 5.0, 5.0, GridSize::new(100, 100), &Palette::default());
        assert!(splat.is_none());
    }
}
