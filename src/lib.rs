//! # inkflow - GPU stable fluids for animated backgrounds
//!
//! A real-time, two-dimensional incompressible fluid rendered as a decorative
//! backdrop. Pointer motion injects velocity and coloured dye, an optional
//! idle driver keeps the surface alive when nobody is interacting, and the
//! dye field is drawn with light shading and a vignette.
//!
//! ## Quick Start
//!
//! ```ignore
//! use inkflow::prelude::*;
//!
//! fn main() -> Result<(), RunError> {
//!     Backdrop::new()
//!         .with_config(SimulationConfig::calm())
//!         .with_palette(Palette::from_hex(Some("#0ea5e9"), Some("#a855f7")))
//!         .run()
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Frames
//!
//! Every frame runs the same fixed sequence of stages, listed by
//! [`frame_stages`]:
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | Curl | velocity | curl |
//! | Vorticity | velocity, curl | velocity |
//! | Divergence | velocity | divergence |
//! | Pressure | pressure, divergence | pressure |
//! | Gradient subtract | pressure, velocity | velocity |
//! | Advect velocity | velocity | velocity |
//! | Advect dye | velocity, dye | dye |
//! | Splat | velocity, dye | velocity, dye |
//! | Display | dye | surface |
//!
//! The splat stage only runs when splats are queued.
//!
//! ### Backends
//!
//! [`FluidEngine`] drives any [`GpuBackend`]. [`WgpuBackend`] renders into a
//! window; [`ReferenceBackend`] runs the same passes on the CPU and is what
//! the property tests measure.
//!
//! ### Availability
//!
//! Starting never panics. [`FluidEngine::start`] reports an [`Availability`]
//! so the host can keep a static background when the effect is disabled,
//! reduced motion is requested, or the GPU can't run it.

pub mod backend;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod field;
pub mod gpu;
pub mod input;
pub mod pipeline;
pub mod reference;
pub mod scheduler;
pub mod shaders;
mod simulation;
pub mod splat;
pub mod time;
pub mod uniforms;
pub mod visuals;

pub use backend::GpuBackend;
pub use config::{HostOptions, IdleMotion, SimulationConfig};
pub use engine::FluidEngine;
pub use error::{Availability, CapabilityError, EngineError, ProgramDiagnostic, RunError, Unavailable};
pub use field::{DoubleBuffer, FieldAllocator, FieldKind, FieldSet, GridSize};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::WgpuBackend;
pub use pipeline::{frame_stages, FrameInput, Program, Stage};
pub use reference::{ReferenceBackend, Solver};
pub use scheduler::FrameRequest;
pub use simulation::Backdrop;
pub use splat::SplatCommand;
pub use visuals::{BlendMode, DisplayConfig, Palette};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use inkflow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{HostOptions, IdleMotion, SimulationConfig};
    pub use crate::engine::FluidEngine;
    pub use crate::error::{Availability, RunError, Unavailable};
    pub use crate::simulation::Backdrop;
    pub use crate::splat::SplatCommand;
    pub use crate::visuals::{BlendMode, DisplayConfig, Palette};
    pub use crate::{Vec2, Vec3, Vec4};
}
