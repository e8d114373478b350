//! Encodes solver stages as fullscreen render passes.
//!
//! Uniforms for every pass of a frame go into one buffer at aligned offsets
//! and are uploaded once before submission.

use crate::field::FieldSet;
use crate::pipeline::{FrameInput, Program, Stage};
use crate::uniforms::StageUniforms;

use super::field_gpu::GpuTarget;
use super::post_process;
use super::programs::ProgramSet;

/// Number of uniform slots one frame needs.
pub fn uniform_slots(frame: &FrameInput<'_>) -> u64 {
    // curl, vorticity, divergence, fade, gradient, two advections, display
    8 + frame.config.pressure_iterations as u64 + 2 * frame.splats.len() as u64
}

/// Per-frame uniform storage with dynamic offsets.
pub struct UniformArena {
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: u64,
    staging: Vec<u8>,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, slots: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let size = std::mem::size_of::<StageUniforms>() as u64;
        let stride = size.div_ceil(alignment) * alignment;
        let capacity = slots.max(1).next_power_of_two();
        Self {
            buffer: Self::create_buffer(device, stride * capacity),
            stride,
            capacity,
            staging: Vec::new(),
        }
    }

    fn create_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stage Uniform Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Make room for `slots` passes. Must run before any bind group of the
    /// frame is created.
    pub fn begin_frame(&mut self, device: &wgpu::Device, slots: u64) {
        if slots > self.capacity {
            self.capacity = slots.next_power_of_two();
            self.buffer.destroy();
            self.buffer = Self::create_buffer(device, self.stride * self.capacity);
            log::debug!("Uniform arena grown to {} slots", self.capacity);
        }
        self.staging.clear();
    }

    fn push(&mut self, uniforms: &StageUniforms) -> u32 {
        let offset = self.staging.len();
        self.staging.extend_from_slice(bytemuck::bytes_of(uniforms));
        self.staging.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    pub fn upload(&mut self, queue: &wgpu::Queue) {
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}

/// Records fullscreen passes into one command encoder.
pub struct StageEncoder<'a> {
    pub device: &'a wgpu::Device,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub programs: &'a ProgramSet,
    pub arena: &'a mut UniformArena,
}

impl StageEncoder<'_> {
    /// One fullscreen draw of `program` into `target`.
    pub fn draw(
        &mut self,
        program: Program,
        target: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        inputs: &[&wgpu::TextureView],
        uniforms: &StageUniforms,
    ) {
        let Some(pipeline) = self.programs.pipeline(program, format) else {
            log::error!("No '{}' pipeline for {:?}", program.label(), format);
            return;
        };
        let offset = self.arena.push(uniforms);

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.arena.buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<StageUniforms>() as u64),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.programs.sampler),
            },
        ];
        for (i, view) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label()),
            layout: self.programs.layout(program),
            entries: &entries,
        });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[offset]);
        pass.draw(0..3, 0..1);
    }

    fn draw_into(&mut self, program: Program, target: &GpuTarget, inputs: &[&GpuTarget], uniforms: &StageUniforms) {
        let views: Vec<&wgpu::TextureView> = inputs.iter().map(|t| &t.view).collect();
        self.draw(program, &target.view, target.format, &views, uniforms);
    }

    /// Encode one stage and swap the pairs it wrote.
    pub fn encode_stage(
        &mut self,
        fields: &mut FieldSet<GpuTarget>,
        stage: Stage,
        frame: &FrameInput<'_>,
        surface: &wgpu::TextureView,
        surface_format: wgpu::TextureFormat,
    ) {
        let config = frame.config;
        let sim = fields.sim_size();
        let dye = fields.dye_size();
        let base = StageUniforms::for_target(sim).with_dt(frame.dt);

        match stage {
            Stage::Curl => {
                self.draw_into(Program::Curl, fields.curl.write(), &[fields.velocity.read()], &base);
                fields.curl.swap();
            }
            Stage::Vorticity => {
                let u = base.with_curl_strength(config.curl_strength);
                self.draw_into(
                    Program::Vorticity,
                    fields.velocity.write(),
                    &[fields.velocity.read(), fields.curl.read()],
                    &u,
                );
                fields.velocity.swap();
            }
            Stage::Divergence => {
                self.draw_into(Program::Divergence, fields.divergence.write(), &[fields.velocity.read()], &base);
                fields.divergence.swap();
            }
            Stage::Pressure => {
                let fade = base.with_value(config.pressure_fade);
                self.draw_into(Program::Blit, fields.pressure.write(), &[fields.pressure.read()], &fade);
                fields.pressure.swap();
                for _ in 0..config.pressure_iterations {
                    self.draw_into(
                        Program::Pressure,
                        fields.pressure.write(),
                        &[fields.pressure.read(), fields.divergence.read()],
                        &base,
                    );
                    fields.pressure.swap();
                }
            }
            Stage::GradientSubtract => {
                self.draw_into(
                    Program::GradientSubtract,
                    fields.velocity.write(),
                    &[fields.pressure.read(), fields.velocity.read()],
                    &base,
                );
                fields.velocity.swap();
            }
            Stage::AdvectVelocity => {
                let u = base.with_dissipation(config.velocity_dissipation);
                self.draw_into(
                    Program::Advection,
                    fields.velocity.write(),
                    &[fields.velocity.read(), fields.velocity.read()],
                    &u,
                );
                fields.velocity.swap();
            }
            Stage::AdvectDye => {
                let u = StageUniforms::for_target(dye)
                    .with_source(sim)
                    .with_dt(frame.dt)
                    .with_dissipation(config.dye_dissipation);
                self.draw_into(
                    Program::Advection,
                    fields.dye.write(),
                    &[fields.velocity.read(), fields.dye.read()],
                    &u,
                );
                fields.dye.swap();
            }
            Stage::Splat => {
                for splat in frame.splats {
                    let u = StageUniforms::for_target(sim).with_splat(splat.position, splat.radius, splat.impulse.extend(0.0));
                    self.draw_into(Program::Splat, fields.velocity.write(), &[fields.velocity.read()], &u);
                    fields.velocity.swap();

                    let u = StageUniforms::for_target(dye).with_splat(splat.position, splat.radius, splat.color);
                    self.draw_into(Program::Splat, fields.dye.write(), &[fields.dye.read()], &u);
                    fields.dye.swap();
                }
            }
            Stage::Display => {
                post_process::encode_display(
                    self,
                    fields.dye.read(),
                    surface,
                    surface_format,
                    &config.display,
                    frame.elapsed,
                );
            }
        }
    }
}
