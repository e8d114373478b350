//! The seam between the engine's lifecycle and whatever executes the passes.

use crate::error::EngineError;
use crate::field::GridSize;
use crate::pipeline::FrameInput;

/// Executes the solver on some device.
///
/// The engine calls these in a fixed order: [`negotiate`](Self::negotiate),
/// [`compile_programs`](Self::compile_programs),
/// [`allocate_fields`](Self::allocate_fields), then
/// [`run_frame`](Self::run_frame) once per frame. On any failure the engine
/// calls [`release`](Self::release) before reporting.
///
/// Implementations must not allocate render targets before
/// `allocate_fields`, and `release` must free everything synchronously and
/// be safe to call repeatedly.
pub trait GpuBackend {
    /// Acquire a device and pick render-target formats.
    fn negotiate(&mut self) -> Result<(), EngineError>;

    /// Compile all nine programs, collecting every failure.
    fn compile_programs(&mut self) -> Result<(), EngineError>;

    /// Create every field at the given resolutions.
    fn allocate_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError>;

    /// Replace every field. New targets exist before old ones are freed.
    fn resize_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError>;

    /// The visible surface changed size. Called for every resize event.
    fn configure_surface(&mut self, size: GridSize);

    /// Encode and submit one frame of the pipeline.
    fn run_frame(&mut self, frame: &FrameInput<'_>) -> Result<(), EngineError>;

    /// Destroy programs, fields and the device.
    fn release(&mut self);

    /// Largest texture side the device accepts.
    fn max_grid_dimension(&self) -> u32;
}
