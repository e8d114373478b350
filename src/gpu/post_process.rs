//! The display pass: dye onto the visible surface.
//!
//! Samples the final dye buffer, applies the cosmetic post-processing from
//! [`DisplayConfig`] (edge shading, vignette, dithering) and writes colour plus
//! an alpha equal to the brightest channel, so the host can composite the
//! surface over page content.

use crate::field::RenderTarget;
use crate::pipeline::Program;
use crate::uniforms::StageUniforms;
use crate::visuals::DisplayConfig;

use super::field_gpu::GpuTarget;
use super::passes::StageEncoder;

/// Render `dye` into the surface view.
pub fn encode_display(
    encoder: &mut StageEncoder<'_>,
    dye: &GpuTarget,
    surface: &wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
    display: &DisplayConfig,
    time: f32,
) {
    let uniforms = StageUniforms::for_target(dye.size()).with_display(display, time);
    encoder.draw(Program::Display, surface, surface_format, &[&dye.view], &uniforms);
}
