//! Compiles the nine solver programs into render pipelines.
//!
//! Each program gets one pipeline per output format it renders into. Every
//! program is compiled inside its own validation error scope so one broken
//! program doesn't hide the others: all failures come back together.

use std::collections::HashMap;

use crate::error::{EngineError, ProgramDiagnostic};
use crate::pipeline::Program;
use crate::shaders::program_source;
use crate::uniforms::StageUniforms;

use super::context::TargetFormats;

/// All compiled pipelines plus the shared layouts and sampler.
pub struct ProgramSet {
    one_input: wgpu::BindGroupLayout,
    two_input: wgpu::BindGroupLayout,
    pipelines: HashMap<(Program, wgpu::TextureFormat), wgpu::RenderPipeline>,
    pub sampler: wgpu::Sampler,
}

fn output_formats(
    program: Program,
    formats: &TargetFormats,
    surface_format: wgpu::TextureFormat,
) -> Vec<wgpu::TextureFormat> {
    let mut out = match program {
        Program::Curl | Program::Divergence | Program::Pressure | Program::Blit => vec![formats.scalar],
        Program::Vorticity | Program::GradientSubtract => vec![formats.velocity],
        Program::Advection | Program::Splat => vec![formats.velocity, formats.dye],
        Program::Display => vec![surface_format],
    };
    out.dedup();
    out
}

fn create_layout(device: &wgpu::Device, textures: u32) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<StageUniforms>() as u64),
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ];
    for i in 0..textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + i,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(if textures == 1 {
            "Stage Bind Group Layout (1 input)"
        } else {
            "Stage Bind Group Layout (2 inputs)"
        }),
        entries: &entries,
    })
}

impl ProgramSet {
    /// Compile every program. Any failure aborts with every diagnostic.
    pub fn compile(
        device: &wgpu::Device,
        formats: &TargetFormats,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, EngineError> {
        let one_input = create_layout(device, 1);
        let two_input = create_layout(device, 2);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Field Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut pipelines = HashMap::new();
        let mut diagnostics = Vec::new();

        for program in Program::ALL {
            let layout = if program.texture_inputs() == 1 { &one_input } else { &two_input };

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.label()),
                source: wgpu::ShaderSource::Wgsl(program_source(program).into()),
            });
            let info = pollster::block_on(module.get_compilation_info());
            let compile_errors: Vec<String> = info
                .messages
                .iter()
                .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
                .map(|m| m.message.clone())
                .collect();

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(program.label()),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });

            let mut built = Vec::new();
            for format in output_formats(program, formats, surface_format) {
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(program.label()),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &module,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &module,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });
                built.push((format, pipeline));
            }

            let scope_error = pollster::block_on(device.pop_error_scope());
            if !compile_errors.is_empty() || scope_error.is_some() {
                let mut message = compile_errors.join("\n");
                if let Some(e) = scope_error {
                    if !message.is_empty() {
                        message.push('\n');
                    }
                    message.push_str(&e.to_string());
                }
                log::error!("Program '{}' failed to compile: {}", program.label(), message);
                diagnostics.push(ProgramDiagnostic {
                    program: program.label(),
                    message,
                });
                continue;
            }

            for (format, pipeline) in built {
                pipelines.insert((program, format), pipeline);
            }
        }

        if !diagnostics.is_empty() {
            return Err(EngineError::CompileLinkFailure(diagnostics));
        }
        log::debug!("Compiled {} pipelines", pipelines.len());

        Ok(Self {
            one_input,
            two_input,
            pipelines,
            sampler,
        })
    }

    pub fn pipeline(&self, program: Program, format: wgpu::TextureFormat) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&(program, format))
    }

    pub fn layout(&self, program: Program) -> &wgpu::BindGroupLayout {
        if program.texture_inputs() == 1 {
            &self.one_input
        } else {
            &self.two_input
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_formats_dedup_when_degraded() {
        let formats = TargetFormats {
            scalar: wgpu::TextureFormat::Rgba8Unorm,
            velocity: wgpu::TextureFormat::Rgba8Unorm,
            dye: wgpu::TextureFormat::Rgba8Unorm,
            degraded: true,
        };
        let out = output_formats(Program::Splat, &formats, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(out, vec![wgpu::TextureFormat::Rgba8Unorm]);
    }

    #[test]
    fn test_display_renders_to_surface() {
        let formats = TargetFormats {
            scalar: wgpu::TextureFormat::R16Float,
            velocity: wgpu::TextureFormat::Rg16Float,
            dye: wgpu::TextureFormat::Rgba16Float,
            degraded: false,
        };
        let out = output_formats(Program::Display, &formats, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(out, vec![wgpu::TextureFormat::Bgra8UnormSrgb]);
        assert_eq!(output_formats(Program::Advection, &formats, wgpu::TextureFormat::Bgra8UnormSrgb).len(), 2);
    }
}
