//! GPU render targets for simulated fields.

use crate::field::{GridSize, RenderTarget, Slot, TargetDesc, TargetFactory};

use super::context::TargetFormats;

/// One field texture plus the view passes render into and sample from.
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    size: GridSize,
}

impl RenderTarget for GpuTarget {
    fn size(&self) -> GridSize {
        self.size
    }
}

/// Creates field textures on one device.
///
/// New textures are cleared by the device, so every field starts at zero.
pub struct GpuTargetFactory<'a> {
    device: &'a wgpu::Device,
    formats: TargetFormats,
    created: usize,
    released: usize,
}

impl<'a> GpuTargetFactory<'a> {
    pub fn new(device: &'a wgpu::Device, formats: TargetFormats) -> Self {
        Self {
            device,
            formats,
            created: 0,
            released: 0,
        }
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.created, self.released)
    }
}

impl TargetFactory for GpuTargetFactory<'_> {
    type Target = GpuTarget;

    fn create_target(&mut self, desc: &TargetDesc) -> GpuTarget {
        let format = self.formats.for_kind(desc.kind);
        let slot = match desc.slot {
            Slot::A => "A",
            Slot::B => "B",
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("Field {} {}", desc.kind.label(), slot)),
            size: wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.created += 1;
        GpuTarget {
            texture,
            view,
            format,
            size: desc.size,
        }
    }

    fn release_target(&mut self, target: GpuTarget) {
        target.texture.destroy();
        self.released += 1;
    }
}
