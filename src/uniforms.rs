//! Uniform block shared by every solver program.
//!
//! All nine programs read the same 80-byte struct at `@group(0) @binding(0)`;
//! each program only looks at the fields it needs. Must match
//! `StageUniforms` in the WGSL prelude byte for byte.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::field::GridSize;
use crate::visuals::DisplayConfig;

/// Per-pass uniforms uploaded to GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StageUniforms {
    /// Texel size of the render target.
    pub texel_size: [f32; 2],
    /// Texel size of the grid the sampled velocity lives on.
    pub source_texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    pub curl_strength: f32,
    /// Generic scalar: fade factor for blit.
    pub value: f32,
    /// Splat centre in normalized coordinates.
    pub point: [f32; 2],
    pub radius: f32,
    /// Target width over height.
    pub aspect: f32,
    /// Splat payload: impulse in `xy` for velocity, colour in `rgb` for dye.
    pub color: [f32; 4],
    pub shading: f32,
    pub vignette: f32,
    pub dither: f32,
    pub time: f32,
}

impl StageUniforms {
    /// Uniforms for a pass rendering into a grid of `target` size.
    pub fn for_target(target: GridSize) -> Self {
        Self {
            texel_size: target.texel_size().to_array(),
            source_texel_size: target.texel_size().to_array(),
            aspect: target.aspect(),
            ..Self::zeroed()
        }
    }

    pub fn with_source(mut self, source: GridSize) -> Self {
        self.source_texel_size = source.texel_size().to_array();
        self
    }

    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_dissipation(mut self, dissipation: f32) -> Self {
        self.dissipation = dissipation;
        self
    }

    pub fn with_curl_strength(mut self, curl_strength: f32) -> Self {
        self.curl_strength = curl_strength;
        self
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    /// Splat position, radius and payload.
    pub fn with_splat(mut self, point: Vec2, radius: f32, payload: Vec3) -> Self {
        self.point = point.to_array();
        self.radius = radius;
        self.color = payload.extend(0.0).to_array();
        self
    }

    pub fn with_display(mut self, display: &DisplayConfig, time: f32) -> Self {
        self.shading = if display.shading { 1.0 } else { 0.0 };
        self.vignette = display.vignette;
        self.dither = if display.dithering { 1.0 } else { 0.0 };
        self.time = time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<StageUniforms>(), 80);
        let u = StageUniforms::zeroed();
        let base = &u as *const _ as usize;
        assert_eq!(&u.point as *const _ as usize - base, 32);
        assert_eq!(&u.color as *const _ as usize - base, 48);
        assert_eq!(&u.time as *const _ as usize - base, 76);
    }

    #[test]
    fn test_for_target() {
        let u = StageUniforms::for_target(GridSize::new(200, 100)).with_source(GridSize::square(50));
        assert_eq!(u.texel_size, [0.005, 0.01]);
        assert_eq!(u.source_texel_size, [0.02, 0.02]);
        assert_eq!(u.aspect, 2.0);
    }

    #[test]
    fn test_splat_payload() {
        let u = StageUniforms::default().with_splat(Vec2::new(0.25, 0.75), 0.1, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(u.color, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(u.point, [0.25, 0.75]);
    }
}
