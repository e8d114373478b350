//! Desktop runner: a winit window with the fluid engine as its background.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Theme, Window, WindowId},
};

use crate::config::{HostOptions, SimulationConfig};
use crate::engine::FluidEngine;
use crate::error::{Availability, RunError};
use crate::gpu::WgpuBackend;
use crate::scheduler::FrameRequest;
use crate::visuals::Palette;

/// A fluid background window builder.
///
/// Use method chaining to configure, then call `.run()` to start.
///
/// ```ignore
/// Backdrop::new()
///     .with_config(SimulationConfig::calm())
///     .with_palette(Palette::from_hex(Some("#0ea5e9"), Some("#a855f7")))
///     .run()?;
/// ```
pub struct Backdrop {
    config: SimulationConfig,
    options: HostOptions,
    palette: Palette,
    dark_palette: Option<Palette>,
    title: String,
    size: (u32, u32),
}

impl Backdrop {
    pub fn new() -> Self {
        Self {
            config: SimulationConfig::ink(),
            options: HostOptions::default(),
            palette: Palette::default(),
            dark_palette: None,
            title: "inkflow".to_string(),
            size: (1280, 720),
        }
    }

    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Palette used while the system theme is dark.
    pub fn with_dark_palette(mut self, palette: Palette) -> Self {
        self.dark_palette = Some(palette);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Initial inner size in logical pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Run until the window is closed.
    pub fn run(self) -> Result<(), RunError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Wait);

        let mut app = App {
            settings: self,
            window: None,
            engine: None,
            error: None,
        };
        event_loop.run_app(&mut app)?;
        match app.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Backdrop {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    settings: Backdrop,
    window: Option<Arc<Window>>,
    engine: Option<FluidEngine<WgpuBackend>>,
    error: Option<RunError>,
}

impl App {
    fn palette_for(&self, theme: Theme) -> Palette {
        match (theme, self.settings.dark_palette) {
            (Theme::Dark, Some(dark)) => dark,
            _ => self.settings.palette,
        }
    }

    /// Log why the effect is off. Returns true when frames should be requested.
    fn report(availability: &Availability) -> bool {
        match availability {
            Availability::Available => true,
            Availability::Unavailable(reason) => {
                log::warn!("Showing static background: {}", reason);
                false
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let (Some(window), Some(engine)) = (&self.window, &mut self.engine) {
            let size = window.inner_size();
            if Self::report(engine.resume(size.width, size.height, Instant::now())) {
                window.request_redraw();
            }
            return;
        }
        let (width, height) = self.settings.size;
        let window_attrs = Window::default_attributes()
            .with_title(self.settings.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(width, height))
            .with_transparent(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.error = Some(RunError::Window(e));
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let palette = window
            .theme()
            .map(|theme| self.palette_for(theme))
            .unwrap_or(self.settings.palette);
        let mut engine = FluidEngine::new(
            WgpuBackend::new(window.clone()),
            self.settings.config.clone(),
            self.settings.options,
            palette,
        );

        let size = window.inner_size();
        if Self::report(engine.resume(size.width, size.height, Instant::now())) {
            window.request_redraw();
        }
        self.engine = Some(engine);
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = &mut self.engine {
            engine.stop();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                if let Some(engine) = &mut self.engine {
                    engine.stop();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(engine) = &mut self.engine {
                    engine.resize(physical_size.width, physical_size.height, Instant::now());
                    if engine.is_running() {
                        window.request_redraw();
                    }
                }
            }
            WindowEvent::ThemeChanged(theme) => {
                let palette = self.palette_for(theme);
                if let Some(engine) = &mut self.engine {
                    log::debug!("Theme changed to {:?}, swapping palette", theme);
                    engine.set_palette(palette);
                }
            }
            WindowEvent::CursorMoved { .. } | WindowEvent::CursorLeft { .. } => {
                if let Some(engine) = &mut self.engine {
                    engine.handle_window_event(&event);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(engine) = &mut self.engine {
                    match engine.frame(Instant::now()) {
                        FrameRequest::Continue => window.request_redraw(),
                        FrameRequest::Idle => {
                            if let Availability::Unavailable(reason) = engine.availability() {
                                log::warn!("Fluid background stopped: {}", reason);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
