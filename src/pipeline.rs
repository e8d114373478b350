//! The fixed solver pipeline: stages, programs and per-frame input.
//!
//! Every backend walks [`frame_stages`] and nothing else, so the nine-stage
//! order lives in exactly one place. Out-of-order execution corrupts the
//! simulation.

use crate::config::SimulationConfig;
use crate::splat::SplatCommand;

/// One pass of the per-frame solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Velocity → curl.
    Curl,
    /// Curl → velocity forcing; swap.
    Vorticity,
    /// Velocity → divergence.
    Divergence,
    /// Fade, then N Jacobi iterations; swap each iteration.
    Pressure,
    /// Velocity minus pressure gradient; swap.
    GradientSubtract,
    /// Velocity advected by itself; swap.
    AdvectVelocity,
    /// Dye advected by velocity; swap.
    AdvectDye,
    /// Pending splats into velocity and dye; swap both. Skipped with no splats.
    Splat,
    /// Dye → visible surface.
    Display,
}

/// All stages in execution order.
pub const STAGE_ORDER: [Stage; 9] = [
    Stage::Curl,
    Stage::Vorticity,
    Stage::Divergence,
    Stage::Pressure,
    Stage::GradientSubtract,
    Stage::AdvectVelocity,
    Stage::AdvectDye,
    Stage::Splat,
    Stage::Display,
];

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Curl => "curl",
            Stage::Vorticity => "vorticity",
            Stage::Divergence => "divergence",
            Stage::Pressure => "pressure",
            Stage::GradientSubtract => "gradient_subtract",
            Stage::AdvectVelocity => "advect_velocity",
            Stage::AdvectDye => "advect_dye",
            Stage::Splat => "splat",
            Stage::Display => "display",
        }
    }
}

/// A compiled program. Both advection stages share [`Program::Advection`];
/// [`Program::Blit`] fades pressure before relaxation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Advection,
    Splat,
    Display,
    Blit,
}

impl Program {
    pub const ALL: [Program; 9] = [
        Program::Curl,
        Program::Vorticity,
        Program::Divergence,
        Program::Pressure,
        Program::GradientSubtract,
        Program::Advection,
        Program::Splat,
        Program::Display,
        Program::Blit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Program::Curl => "curl",
            Program::Vorticity => "vorticity",
            Program::Divergence => "divergence",
            Program::Pressure => "pressure",
            Program::GradientSubtract => "gradient_subtract",
            Program::Advection => "advection",
            Program::Splat => "splat",
            Program::Display => "display",
            Program::Blit => "blit",
        }
    }

    /// Number of sampled field inputs.
    pub fn texture_inputs(&self) -> u32 {
        match self {
            Program::Curl | Program::Divergence | Program::Splat | Program::Display | Program::Blit => 1,
            Program::Vorticity | Program::Pressure | Program::GradientSubtract | Program::Advection => 2,
        }
    }
}

/// Everything one frame's solve needs.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    /// Clamped time step in seconds.
    pub dt: f32,
    /// Seconds since the engine started.
    pub elapsed: f32,
    /// Splats queued since the previous frame, in arrival order.
    pub splats: &'a [SplatCommand],
    pub config: &'a SimulationConfig,
}

/// Stages to run for `frame`, in order.
pub fn frame_stages(frame: &FrameInput<'_>) -> impl Iterator<Item = Stage> {
    let splat = !frame.splats.is_empty();
    STAGE_ORDER.into_iter().filter(move |&stage| stage != Stage::Splat || splat)
}
