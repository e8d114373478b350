//! The fluid engine: lifecycle, scheduling and splat routing.
//!
//! One [`FluidEngine`] owns its backend, fields, config and palette. There is
//! no shared state, so several engines can run side by side.
//!
//! # Lifecycle
//!
//! ```text
//!            start()                      first nonzero resize
//! Stopped ──────────▶ Deferred (zero size) ─────────────────────▶ Running
//!    ▲                                                              │
//!    └──────────────────────── stop() / failure ◀───────────────────┘
//! ```
//!
//! Every failure releases the backend before the status changes. A failure
//! while running gets exactly one reinitialization attempt per session; after
//! that the engine stays [`Unavailable::RecoveryFailed`].

use std::time::Instant;

use winit::event::WindowEvent;

use crate::backend::GpuBackend;
use crate::config::{HostOptions, SimulationConfig};
use crate::emitter::IdleDriver;
use crate::error::{Availability, EngineError, Unavailable};
use crate::field::GridSize;
use crate::input::PointerDriver;
use crate::pipeline::FrameInput;
use crate::scheduler::{FrameRequest, ResizeDebounce};
use crate::splat::{SplatCommand, SplatQueue};
use crate::time::FrameClock;
use crate::visuals::Palette;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Stopped,
    /// Start was requested while the surface had zero size.
    Deferred,
    Running,
}

/// A configured fluid background bound to one backend.
pub struct FluidEngine<B: GpuBackend> {
    backend: B,
    config: SimulationConfig,
    options: HostOptions,
    palette: Palette,
    phase: Phase,
    status: Availability,
    /// `None` while the surface has zero size.
    surface: Option<GridSize>,
    debounce: ResizeDebounce,
    clock: FrameClock,
    splats: SplatQueue,
    pointer: PointerDriver,
    idle: Option<IdleDriver>,
    recovery_used: bool,
}

impl<B: GpuBackend> FluidEngine<B> {
    /// Build an engine. No GPU work happens until [`start`](Self::start).
    ///
    /// `config` and `options` are clamped into their valid ranges.
    pub fn new(backend: B, config: SimulationConfig, options: HostOptions, palette: Palette) -> Self {
        let config = config.sanitized();
        let options = options.sanitized();
        Self {
            debounce: ResizeDebounce::new(config.resize_debounce()),
            clock: FrameClock::new(config.max_frame_delta()),
            pointer: PointerDriver::new(&config),
            idle: IdleDriver::new(&config),
            backend,
            config,
            options,
            palette,
            phase: Phase::Stopped,
            status: Availability::Available,
            surface: None,
            splats: SplatQueue::new(),
            recovery_used: false,
        }
    }

    /// Start the effect.
    ///
    /// Honors `enabled` and `reduced_motion` before touching the backend. With
    /// a zero-size surface the start is deferred and reported as available;
    /// initialization runs on the first nonzero [`resize`](Self::resize).
    pub fn start(&mut self, now: Instant) -> &Availability {
        if !self.options.enabled {
            log::info!("Fluid background disabled by host");
            self.status = Availability::Unavailable(Unavailable::Disabled);
            return &self.status;
        }
        if self.options.reduced_motion {
            log::info!("Reduced motion requested, not starting fluid background");
            self.status = Availability::Unavailable(Unavailable::ReducedMotion);
            return &self.status;
        }
        if matches!(self.status, Availability::Unavailable(Unavailable::RecoveryFailed(_))) {
            return &self.status;
        }
        if self.phase != Phase::Stopped {
            return &self.status;
        }

        self.clock.start(now);
        match self.surface {
            Some(size) => self.initialize(size, now),
            None => {
                log::info!("Surface has zero size, deferring initialization");
                self.phase = Phase::Deferred;
                self.status = Availability::Available;
            }
        }
        &self.status
    }

    /// Stop the effect and release every GPU resource. Safe at any time.
    ///
    /// A stopped engine that has not failed still reports
    /// [`Availability::Available`]; use [`is_running`](Self::is_running) to
    /// tell running from stopped.
    pub fn stop(&mut self) {
        if self.phase != Phase::Stopped {
            log::info!(
                "Stopping fluid background after {} frames ({:.1} fps)",
                self.clock.frame(),
                self.clock.fps()
            );
        }
        self.debounce.cancel();
        self.splats.clear();
        self.clock.stop();
        if let Some(idle) = self.idle.as_mut() {
            idle.reset();
        }
        self.backend.release();
        self.phase = Phase::Stopped;
    }

    /// Bring the effect back after the host was suspended: record the current
    /// surface size, then [`start`](Self::start).
    pub fn resume(&mut self, width: u32, height: u32, now: Instant) -> &Availability {
        self.resize(width, height, now);
        self.start(now)
    }

    /// The surface changed size (physical pixels).
    ///
    /// Field reallocation waits for the debounce window; the first nonzero
    /// size after a deferred start initializes immediately.
    pub fn resize(&mut self, width: u32, height: u32, now: Instant) {
        if width == 0 || height == 0 {
            self.surface = None;
            self.debounce.cancel();
            return;
        }
        let size = GridSize::new(width, height);
        self.surface = Some(size);
        match self.phase {
            Phase::Deferred => self.initialize(size, now),
            Phase::Running => {
                self.backend.configure_surface(size);
                self.debounce.request(size, now);
            }
            Phase::Stopped => {}
        }
    }

    /// Run one frame: clamp dt, apply a due resize, tick idle motion, then
    /// run every stage with the splats queued since the last frame.
    ///
    /// Returns [`FrameRequest::Idle`] while the surface has zero size; the
    /// host schedules again on the next nonzero resize.
    pub fn frame(&mut self, now: Instant) -> FrameRequest {
        if self.phase != Phase::Running || self.surface.is_none() {
            return FrameRequest::Idle;
        }
        let dt = self.clock.tick(now);

        if let Some(size) = self.debounce.take_due(now) {
            let (sim, dye) = self.grid_sizes(size);
            log::debug!("Resize settled at {}x{}", size.width, size.height);
            if let Err(e) = self.backend.resize_fields(sim, dye) {
                return self.handle_failure(e, now);
            }
        }

        if let Some(idle) = self.idle.as_mut() {
            if let Some(splat) = idle.tick(self.clock.elapsed(), &self.palette) {
                self.splats.push(splat);
            }
        }

        let splats = self.splats.drain();
        let input = FrameInput {
            dt,
            elapsed: self.clock.elapsed(),
            splats: &splats,
            config: &self.config,
        };
        match self.backend.run_frame(&input) {
            Ok(()) => FrameRequest::Continue,
            Err(e) => self.handle_failure(e, now),
        }
    }

    /// Raw pointer movement in surface pixels.
    pub fn on_pointer_move(&mut self, x: f32, y: f32, dx: f32, dy: f32) {
        if self.phase != Phase::Running {
            return;
        }
        let Some(surface) = self.surface else {
            return;
        };
        if let Some(splat) = self.pointer.on_pointer_move(x, y, dx, dy, surface, &self.palette) {
            self.splats.push(splat);
        }
    }

    /// Feed a winit window event to the pointer driver.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        let Some(surface) = self.surface else {
            return;
        };
        let splat = self.pointer.handle_event(event, surface, &self.palette);
        if self.phase == Phase::Running {
            if let Some(splat) = splat {
                self.splats.push(splat);
            }
        }
    }

    /// Queue a splat for the next frame.
    pub fn push_splat(&mut self, splat: SplatCommand) {
        if self.phase == Phase::Running {
            self.splats.push(splat);
        }
    }

    /// Replace the palette. Takes effect on the next splat.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Whether the effect can run.
    ///
    /// `Available` means "not failed", not "running": it holds while stopped
    /// and while a start is deferred on a zero-size surface.
    pub fn availability(&self) -> &Availability {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn surface_size(&self) -> Option<GridSize> {
        self.surface
    }

    pub fn pending_splats(&self) -> usize {
        self.splats.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Simulation and dye grid sizes for a surface.
    pub fn grid_sizes(&self, surface: GridSize) -> (GridSize, GridSize) {
        let max = self.backend.max_grid_dimension();
        (
            surface.scaled(self.config.sim_resolution_scale, max),
            surface.scaled(self.config.dye_resolution_scale, max),
        )
    }

    fn initialize(&mut self, size: GridSize, now: Instant) {
        match self.try_initialize(size) {
            Ok(()) => {
                log::info!("Fluid background running at {}x{}", size.width, size.height);
                self.phase = Phase::Running;
                self.status = Availability::Available;
                self.clock.start(now);
            }
            Err(e) => {
                log::error!("Fluid background unavailable: {}", e);
                self.backend.release();
                self.phase = Phase::Stopped;
                self.status = Availability::Unavailable(if self.recovery_used {
                    Unavailable::RecoveryFailed(e)
                } else {
                    Unavailable::Failed(e)
                });
            }
        }
    }

    fn try_initialize(&mut self, size: GridSize) -> Result<(), EngineError> {
        self.backend.negotiate()?;
        self.backend.compile_programs()?;
        self.backend.configure_surface(size);
        let (sim, dye) = self.grid_sizes(size);
        self.backend.allocate_fields(sim, dye)
    }

    fn handle_failure(&mut self, error: EngineError, now: Instant) -> FrameRequest {
        log::error!("Fluid background stopped: {}", error);
        self.debounce.cancel();
        self.splats.clear();
        self.backend.release();
        self.phase = Phase::Stopped;

        if self.recovery_used {
            self.status = Availability::Unavailable(Unavailable::RecoveryFailed(error));
            return FrameRequest::Idle;
        }
        self.recovery_used = true;
        log::warn!("Attempting to reinitialize after failure");

        match self.surface {
            Some(size) => {
                self.initialize(size, now);
                if self.is_running() {
                    FrameRequest::Continue
                } else {
                    FrameRequest::Idle
                }
            }
            None => {
                self.phase = Phase::Deferred;
                FrameRequest::Idle
            }
        }
    }
}

impl<B: GpuBackend> Drop for FluidEngine<B> {
    fn drop(&mut self) {
        self.backend.release();
    }
}
