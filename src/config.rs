//! Simulation tunables and host options.
//!
//! [`SimulationConfig`] is fixed when an engine is built. The three stock
//! variants of the effect are presets of the same config rather than
//! separate pipelines:
//!
//! | Preset | Resolution | Drivers | Character |
//! |--------|------------|---------|-----------|
//! | [`SimulationConfig::ink`] | 0.5 / 1.0 | pointer + idle | default |
//! | [`SimulationConfig::calm`] | 0.3 / 0.6 | idle only | slow, long-lived dye |
//! | [`SimulationConfig::vivid`] | 1.0 / 1.0 | pointer only | strong swirls |
//!
//! Out-of-range values never cause a failure: [`SimulationConfig::sanitized`]
//! clamps each one to its nearest valid bound and logs a warning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::visuals::{BlendMode, DisplayConfig};

/// Largest valid dissipation multiplier. A multiplier of 1 never fades.
pub const MAX_DISSIPATION: f32 = 0.999;
/// Smallest valid dissipation multiplier.
pub const MIN_DISSIPATION: f32 = 0.01;
/// Smallest valid resolution scale.
pub const MIN_RESOLUTION_SCALE: f32 = 0.05;
/// Largest pressure iteration count accepted.
pub const MAX_PRESSURE_ITERATIONS: u32 = 200;

/// Autonomous motion that keeps the effect alive without input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleMotion {
    /// Half-extent of the Lissajous path in normalized coordinates.
    pub amplitude: f32,
    /// Angular speed of the path in radians per second.
    pub speed: f32,
    /// Impulse scale applied to the path's velocity.
    pub force: f32,
    /// Dye brightness of idle splats.
    pub intensity: f32,
    /// Seconds between idle splats (0 = every frame).
    pub interval: f32,
}

impl Default for IdleMotion {
    fn default() -> Self {
        Self {
            amplitude: 0.3,
            speed: 0.35,
            force: 400.0,
            intensity: 0.08,
            interval: 0.0,
        }
    }
}

/// Immutable solver tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Per-frame velocity multiplier after advection.
    pub velocity_dissipation: f32,
    /// Per-frame dye multiplier after advection; usually closer to 1.
    pub dye_dissipation: f32,
    /// Vorticity confinement strength.
    pub curl_strength: f32,
    /// Jacobi iterations per frame.
    ///
    /// Fewer iterations under-relax the projection and swirls stop settling.
    /// This is a quality/performance knob, not a correctness error.
    pub pressure_iterations: u32,
    /// Fraction of last frame's pressure kept as the Jacobi starting point.
    pub pressure_fade: f32,
    /// Splat Gaussian width as a fraction of surface height.
    pub splat_radius: f32,
    /// Scale from pointer movement (surface fractions) to impulse.
    pub splat_force: f32,
    /// Dye brightness of pointer splats.
    pub splat_intensity: f32,
    /// Simulation grid size relative to the surface.
    pub sim_resolution_scale: f32,
    /// Dye grid size relative to the surface.
    pub dye_resolution_scale: f32,
    /// Upper bound for a frame's time step, in milliseconds.
    pub max_frame_delta_ms: f32,
    /// Quiet window before a resize reallocates fields, in milliseconds.
    pub resize_debounce_ms: u64,
    /// Whether pointer movement emits splats.
    pub pointer_splats: bool,
    /// Autonomous motion, `None` to disable.
    pub idle: Option<IdleMotion>,
    pub display: DisplayConfig,
}

impl SimulationConfig {
    /// Default preset: pointer interaction plus gentle idle motion.
    pub fn ink() -> Self {
        Self {
            velocity_dissipation: 0.98,
            dye_dissipation: 0.97,
            curl_strength: 30.0,
            pressure_iterations: 20,
            pressure_fade: 0.8,
            splat_radius: 0.05,
            splat_force: 6000.0,
            splat_intensity: 0.3,
            sim_resolution_scale: 0.5,
            dye_resolution_scale: 1.0,
            max_frame_delta_ms: 33.0,
            resize_debounce_ms: 150,
            pointer_splats: true,
            idle: Some(IdleMotion::default()),
            display: DisplayConfig::default(),
        }
    }

    /// Low-cost ambient preset without pointer interaction.
    pub fn calm() -> Self {
        Self {
            velocity_dissipation: 0.99,
            dye_dissipation: 0.995,
            curl_strength: 12.0,
            pressure_iterations: 12,
            sim_resolution_scale: 0.3,
            dye_resolution_scale: 0.6,
            pointer_splats: false,
            idle: Some(IdleMotion {
                amplitude: 0.35,
                speed: 0.2,
                force: 250.0,
                intensity: 0.05,
                interval: 0.05,
            }),
            display: DisplayConfig {
                shading: false,
                ..DisplayConfig::default()
            },
            ..Self::ink()
        }
    }

    /// Full-resolution interactive preset without idle motion.
    pub fn vivid() -> Self {
        Self {
            velocity_dissipation: 0.985,
            dye_dissipation: 0.98,
            curl_strength: 45.0,
            pressure_iterations: 30,
            splat_radius: 0.04,
            splat_intensity: 0.5,
            sim_resolution_scale: 1.0,
            dye_resolution_scale: 1.0,
            idle: None,
            ..Self::ink()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "ink" => Some(Self::ink()),
            "calm" => Some(Self::calm()),
            "vivid" => Some(Self::vivid()),
            _ => None,
        }
    }

    /// Parse a JSON config. Fields left out take their [`ink`](Self::ink) values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    /// Clamp every value into its documented bounds.
    pub fn sanitized(mut self) -> Self {
        self.velocity_dissipation = clamp_logged(
            "velocity_dissipation",
            self.velocity_dissipation,
            MIN_DISSIPATION,
            MAX_DISSIPATION,
        );
        self.dye_dissipation = clamp_logged("dye_dissipation", self.dye_dissipation, MIN_DISSIPATION, MAX_DISSIPATION);
        self.curl_strength = clamp_logged("curl_strength", self.curl_strength, 0.0, 200.0);
        if !(1..=MAX_PRESSURE_ITERATIONS).contains(&self.pressure_iterations) {
            let clamped = self.pressure_iterations.clamp(1, MAX_PRESSURE_ITERATIONS);
            log::warn!(
                "pressure_iterations {} out of range, clamped to {}",
                self.pressure_iterations,
                clamped
            );
            self.pressure_iterations = clamped;
        }
        self.pressure_fade = clamp_logged("pressure_fade", self.pressure_fade, 0.0, 1.0);
        self.splat_radius = clamp_logged("splat_radius", self.splat_radius, 0.001, 1.0);
        self.splat_force = clamp_logged("splat_force", self.splat_force, 0.0, 100_000.0);
        self.splat_intensity = clamp_logged("splat_intensity", self.splat_intensity, 0.0, 10.0);
        self.sim_resolution_scale = clamp_logged("sim_resolution_scale", self.sim_resolution_scale, MIN_RESOLUTION_SCALE, 1.0);
        self.dye_resolution_scale = clamp_logged("dye_resolution_scale", self.dye_resolution_scale, MIN_RESOLUTION_SCALE, 1.0);
        self.max_frame_delta_ms = clamp_logged("max_frame_delta_ms", self.max_frame_delta_ms, 1.0, 250.0);
        self.display.vignette = clamp_logged("display.vignette", self.display.vignette, 0.0, 1.0);
        if let Some(idle) = self.idle.as_mut() {
            idle.amplitude = clamp_logged("idle.amplitude", idle.amplitude, 0.0, 0.5);
            idle.speed = clamp_logged("idle.speed", idle.speed, 0.0, 20.0);
            idle.force = clamp_logged("idle.force", idle.force, 0.0, 100_000.0);
            idle.intensity = clamp_logged("idle.intensity", idle.intensity, 0.0, 10.0);
            idle.interval = clamp_logged("idle.interval", idle.interval, 0.0, 10.0);
        }
        self
    }

    pub fn max_frame_delta(&self) -> Duration {
        Duration::from_secs_f32(self.max_frame_delta_ms / 1000.0)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::ink()
    }
}

/// Clamp `value` into `[lo, hi]`, logging when it moves. NaN maps to `lo`.
fn clamp_logged(name: &str, value: f32, lo: f32, hi: f32) -> f32 {
    let clamped = if value.is_nan() { lo } else { value.clamp(lo, hi) };
    if clamped != value {
        log::warn!("{} = {} out of range [{}, {}], clamped to {}", name, value, lo, hi, clamped);
    }
    clamped
}

/// Options the host passes at construction.
///
/// `opacity` and `blend_mode` are for hosts that composite the effect over
/// their own content. The engine and the bundled [`Backdrop`](crate::Backdrop)
/// runner never read them: the runner's window composites with
/// premultiplied alpha at full opacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostOptions {
    /// When false the engine never acquires a context or starts.
    pub enabled: bool,
    /// User prefers reduced motion: the engine must not start.
    pub reduced_motion: bool,
    /// Opacity an external compositor applies (0..1).
    pub opacity: f32,
    /// Blend mode an external compositor applies. See
    /// [`BlendMode::to_blend_state`] for wgpu hosts.
    pub blend_mode: BlendMode,
}

impl HostOptions {
    pub fn sanitized(mut self) -> Self {
        self.opacity = clamp_logged("opacity", self.opacity, 0.0, 1.0);
        self
    }
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            reduced_motion: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }
}
