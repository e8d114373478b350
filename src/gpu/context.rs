//! Capability negotiation: adapter, device, surface and field formats.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use winit::window::Window;

use crate::error::CapabilityError;
use crate::field::{FieldKind, GridSize};

/// One way of asking for an adapter.
struct AdapterAttempt {
    label: &'static str,
    backends: wgpu::Backends,
    power_preference: wgpu::PowerPreference,
    force_fallback_adapter: bool,
}

/// Tried in order until one yields an adapter compatible with the surface.
const ADAPTER_ATTEMPTS: [AdapterAttempt; 4] = [
    AdapterAttempt {
        label: "high-performance",
        backends: wgpu::Backends::PRIMARY,
        power_preference: wgpu::PowerPreference::HighPerformance,
        force_fallback_adapter: false,
    },
    AdapterAttempt {
        label: "low-power",
        backends: wgpu::Backends::PRIMARY,
        power_preference: wgpu::PowerPreference::LowPower,
        force_fallback_adapter: false,
    },
    AdapterAttempt {
        label: "any backend",
        backends: wgpu::Backends::all(),
        power_preference: wgpu::PowerPreference::None,
        force_fallback_adapter: false,
    },
    AdapterAttempt {
        label: "software fallback",
        backends: wgpu::Backends::all(),
        power_preference: wgpu::PowerPreference::None,
        force_fallback_adapter: true,
    },
];

const SCALAR_CANDIDATES: [wgpu::TextureFormat; 4] = [
    wgpu::TextureFormat::R16Float,
    wgpu::TextureFormat::Rg16Float,
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba8Unorm,
];

const VELOCITY_CANDIDATES: [wgpu::TextureFormat; 3] = [
    wgpu::TextureFormat::Rg16Float,
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba8Unorm,
];

const DYE_CANDIDATES: [wgpu::TextureFormat; 2] = [wgpu::TextureFormat::Rgba16Float, wgpu::TextureFormat::Rgba8Unorm];

/// Render-target formats chosen for each field class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetFormats {
    pub scalar: wgpu::TextureFormat,
    pub velocity: wgpu::TextureFormat,
    pub dye: wgpu::TextureFormat,
    /// At least one field fell back to normalized 8-bit storage.
    pub degraded: bool,
}

impl TargetFormats {
    pub fn for_kind(&self, kind: FieldKind) -> wgpu::TextureFormat {
        match kind {
            FieldKind::Velocity => self.velocity,
            FieldKind::Dye => self.dye,
            FieldKind::Pressure | FieldKind::Divergence | FieldKind::Curl => self.scalar,
        }
    }
}

/// Pick the first qualifying format for every field class.
///
/// `supports` answers whether a format is renderable, sampleable and
/// filterable on the device.
pub fn negotiate_formats(supports: impl Fn(wgpu::TextureFormat) -> bool) -> Result<TargetFormats, CapabilityError> {
    let pick = |candidates: &[wgpu::TextureFormat]| {
        candidates
            .iter()
            .copied()
            .find(|&f| supports(f))
            .ok_or(CapabilityError::NoRenderableFormat)
    };
    let scalar = pick(&SCALAR_CANDIDATES)?;
    let velocity = pick(&VELOCITY_CANDIDATES)?;
    let dye = pick(&DYE_CANDIDATES)?;
    let degraded = [scalar, velocity, dye].contains(&wgpu::TextureFormat::Rgba8Unorm);
    Ok(TargetFormats {
        scalar,
        velocity,
        dye,
        degraded,
    })
}

fn format_qualifies(adapter: &wgpu::Adapter, format: wgpu::TextureFormat) -> bool {
    let features = adapter.get_texture_format_features(format);
    features
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
        && features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
}

/// Everything tied to one negotiated device.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub formats: TargetFormats,
    /// Set by the device-lost callback.
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Walk the adapter attempts, then create a device and pick formats.
    pub fn negotiate(window: &Arc<Window>, size: GridSize) -> Result<Self, CapabilityError> {
        let mut surface_error = None;
        let mut found = None;

        for attempt in &ADAPTER_ATTEMPTS {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: attempt.backends,
                ..Default::default()
            });
            let surface = match instance.create_surface(window.clone()) {
                Ok(surface) => surface,
                Err(e) => {
                    log::debug!("Adapter attempt '{}': surface creation failed: {}", attempt.label, e);
                    surface_error = Some(e);
                    continue;
                }
            };
            let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: attempt.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: attempt.force_fallback_adapter,
            }));
            match adapter {
                Some(adapter) => {
                    log::debug!("Adapter attempt '{}' succeeded", attempt.label);
                    found = Some((surface, adapter));
                    break;
                }
                None => log::debug!("Adapter attempt '{}': no adapter", attempt.label),
            }
        }

        let (surface, adapter) = match (found, surface_error) {
            (Some(found), _) => found,
            (None, Some(e)) => return Err(CapabilityError::SurfaceCreation(e)),
            (None, None) => return Err(CapabilityError::NoAdapter),
        };

        let adapter_info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let formats = negotiate_formats(|f| format_qualifies(&adapter, f))?;
        if formats.degraded {
            log::warn!("Float render targets unavailable, using 8-bit fields ({:?})", formats);
        } else {
            log::debug!("Field formats: {:?}", formats);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Fluid Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({:?}): {}", reason, message);
            flag.store(true, Ordering::SeqCst);
        });
        device.on_uncaptured_error(Box::new(|e| {
            log::error!("Uncaptured GPU error: {}", e);
        }));

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(CapabilityError::IncompatibleSurface)?;
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            formats,
            lost,
        })
    }

    /// Reconfigure the surface for a new size.
    pub fn configure_surface(&mut self, size: GridSize) {
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}
