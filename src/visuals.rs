//! Colour palette and presentation settings.
//!
//! # Example
//!
//! ```ignore
//! let palette = Palette::from_hex(Some("#1d4ed8"), Some("#f472b6"));
//! engine.set_palette(palette); // takes effect on the next splat
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Fallback primary brand colour (ink blue).
pub const FALLBACK_PRIMARY: Vec3 = Vec3::new(0.18, 0.36, 1.0);

/// Fallback secondary brand colour (magenta).
pub const FALLBACK_SECONDARY: Vec3 = Vec3::new(1.0, 0.24, 0.5);

/// Two brand colours that splat colours are drawn between.
///
/// The palette is read-only from the engine's point of view and can be
/// swapped at any time without restarting the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub primary: Vec3,
    pub secondary: Vec3,
}

impl Palette {
    pub fn new(primary: Vec3, secondary: Vec3) -> Self {
        Self { primary, secondary }
    }

    /// Build from RGB byte triples, substituting fallbacks for missing colours.
    pub fn from_brand(primary: Option<[u8; 3]>, secondary: Option<[u8; 3]>) -> Self {
        let to_vec = |rgb: [u8; 3]| Vec3::new(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32) / 255.0;
        let primary = primary.map(to_vec).unwrap_or_else(|| {
            log::warn!("No primary brand colour supplied, using fallback");
            FALLBACK_PRIMARY
        });
        let secondary = secondary.map(to_vec).unwrap_or_else(|| {
            log::warn!("No secondary brand colour supplied, using fallback");
            FALLBACK_SECONDARY
        });
        Self { primary, secondary }
    }

    /// Build from `#rrggbb` strings. Missing or malformed colours fall back.
    pub fn from_hex(primary: Option<&str>, secondary: Option<&str>) -> Self {
        let parse = |s: Option<&str>| {
            let s = s?;
            let rgb = parse_hex(s);
            if rgb.is_none() {
                log::warn!("Malformed brand colour {:?}", s);
            }
            rgb
        };
        Self::from_brand(parse(primary), parse(secondary))
    }

    /// Linear blend between the two brand colours.
    pub fn color_at(&self, t: f32) -> Vec3 {
        self.primary.lerp(self.secondary, t.clamp(0.0, 1.0))
    }

    /// Pseudo-random colour on the palette axis, scaled by `intensity`.
    pub fn pick(&self, seed: u32, intensity: f32) -> Vec3 {
        self.color_at(pseudo_random(seed)) * intensity
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(FALLBACK_PRIMARY, FALLBACK_SECONDARY)
    }
}

fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

pub(crate) fn pseudo_random(seed: u32) -> f32 {
    let x = seed.wrapping_mul(1103515245).wrapping_add(12345);
    let x = x ^ (x >> 16);
    (x & 0x7FFFFFFF) as f32 / 0x7FFFFFFF as f32
}

/// How the host composites the effect over page content.
///
/// The engine never applies this itself; it is carried for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha blending (default).
    #[default]
    Normal,
    /// Lightens what is underneath; good on dark pages.
    Screen,
    /// Darkens what is underneath; good on light pages.
    Multiply,
    /// Colours add up and glow.
    Additive,
}

impl BlendMode {
    /// Blend state for a host that composites through wgpu.
    pub fn to_blend_state(self) -> wgpu::BlendState {
        let component = |src_factor, dst_factor| wgpu::BlendComponent {
            src_factor,
            dst_factor,
            operation: wgpu::BlendOperation::Add,
        };
        match self {
            BlendMode::Normal => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            BlendMode::Screen => wgpu::BlendState {
                color: component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrc),
                alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha),
            },
            BlendMode::Multiply => wgpu::BlendState {
                color: component(wgpu::BlendFactor::Dst, wgpu::BlendFactor::OneMinusSrcAlpha),
                alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha),
            },
            BlendMode::Additive => wgpu::BlendState {
                color: component(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
                alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
            },
        }
    }
}

/// Cosmetic post-processing applied by the display stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Emphasize dye edges with a fake lighting term.
    pub shading: bool,
    /// Vignette strength (0 = off, 1 = full).
    pub vignette: f32,
    /// Add sub-LSB noise to hide banding.
    pub dithering: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            shading: true,
            vignette: 0.35,
            dithering: true,
        }
    }
}
