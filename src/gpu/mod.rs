//! wgpu backend: runs the solver as fullscreen render passes on a window
//! surface.

mod context;
mod field_gpu;
mod passes;
mod post_process;
mod programs;

use std::sync::Arc;

use winit::window::Window;

use crate::backend::GpuBackend;
use crate::error::{CapabilityError, EngineError};
use crate::field::{FieldAllocator, GridSize};
use crate::pipeline::{frame_stages, FrameInput};

pub use context::{negotiate_formats, GpuContext, TargetFormats};
pub use field_gpu::{GpuTarget, GpuTargetFactory};

use passes::{StageEncoder, UniformArena};
use programs::ProgramSet;

/// Texture limit assumed before a device exists.
const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Initial uniform slots; grows on demand.
const INITIAL_UNIFORM_SLOTS: u64 = 64;

/// [`GpuBackend`] that draws into a winit window.
pub struct WgpuBackend {
    window: Arc<Window>,
    context: Option<GpuContext>,
    programs: Option<ProgramSet>,
    arena: Option<UniformArena>,
    fields: FieldAllocator<GpuTarget>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            context: None,
            programs: None,
            arena: None,
            fields: FieldAllocator::new(),
        }
    }

    fn replace_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        let ctx = self
            .context
            .as_ref()
            .ok_or(EngineError::CapabilityUnavailable(CapabilityError::NoAdapter))?;
        ctx.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let mut factory = GpuTargetFactory::new(&ctx.device, ctx.formats);
        self.fields.resize(&mut factory, sim, dye);
        let (created, released) = factory.counts();
        log::debug!("Field textures: {} created, {} destroyed", created, released);
        match pollster::block_on(ctx.device.pop_error_scope()) {
            Some(e) => Err(EngineError::ContextLost(format!("field allocation failed: {}", e))),
            None => Ok(()),
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn negotiate(&mut self) -> Result<(), EngineError> {
        let size = self.window.inner_size();
        let context = GpuContext::negotiate(&self.window, GridSize::new(size.width, size.height))?;
        self.context = Some(context);
        Ok(())
    }

    fn compile_programs(&mut self) -> Result<(), EngineError> {
        let ctx = self
            .context
            .as_ref()
            .ok_or(EngineError::CapabilityUnavailable(CapabilityError::NoAdapter))?;
        let programs = ProgramSet::compile(&ctx.device, &ctx.formats, ctx.config.format)?;
        self.arena = Some(UniformArena::new(&ctx.device, INITIAL_UNIFORM_SLOTS));
        self.programs = Some(programs);
        Ok(())
    }

    fn allocate_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        self.replace_fields(sim, dye)
    }

    fn resize_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        self.replace_fields(sim, dye)
    }

    fn configure_surface(&mut self, size: GridSize) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.configure_surface(size);
        }
    }

    fn run_frame(&mut self, frame: &FrameInput<'_>) -> Result<(), EngineError> {
        let (Some(ctx), Some(programs), Some(arena)) = (self.context.as_ref(), self.programs.as_ref(), self.arena.as_mut())
        else {
            return Ok(());
        };
        if ctx.is_lost() {
            return Err(EngineError::ContextLost("device lost".into()));
        }
        let Some(fields) = self.fields.fields_mut() else {
            return Ok(());
        };

        let output = match ctx.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                ctx.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(EngineError::ContextLost("surface out of memory".into()));
            }
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return Ok(());
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        arena.begin_frame(&ctx.device, passes::uniform_slots(frame));
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fluid Frame Encoder"),
        });
        {
            let mut stages = StageEncoder {
                device: &ctx.device,
                encoder: &mut encoder,
                programs,
                arena: &mut *arena,
            };
            for stage in frame_stages(frame) {
                stages.encode_stage(fields, stage, frame, &view, ctx.config.format);
            }
        }
        arena.upload(&ctx.queue);
        ctx.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }

    fn release(&mut self) {
        match self.context.as_ref() {
            Some(ctx) => {
                let mut factory = GpuTargetFactory::new(&ctx.device, ctx.formats);
                self.fields.release(&mut factory);
            }
            None => self.fields = FieldAllocator::new(),
        }
        if let Some(arena) = self.arena.take() {
            arena.destroy();
        }
        self.programs = None;
        if let Some(ctx) = self.context.take() {
            let _ = ctx.device.poll(wgpu::Maintain::Wait);
            log::debug!("Released GPU context");
        }
    }

    fn max_grid_dimension(&self) -> u32 {
        self.context
            .as_ref()
            .map(GpuContext::max_texture_dimension)
            .unwrap_or(DEFAULT_MAX_DIMENSION)
    }
}
