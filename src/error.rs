//! Error types for inkflow.
//!
//! Nothing in here ever crosses into host logic as a panic: the engine turns
//! every failure into an [`Availability::Unavailable`] status and the host
//! shows its static presentation instead.

use std::fmt;

/// Why no usable GPU context could be acquired.
#[derive(Debug)]
pub enum CapabilityError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No adapter matched any of the negotiation attempts.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// No texture format is renderable, sampleable and filterable.
    NoRenderableFormat,
    /// The surface reported no supported presentation format.
    IncompatibleSurface,
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            CapabilityError::NoAdapter => write!(f, "No compatible GPU adapter found after all negotiation attempts"),
            CapabilityError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            CapabilityError::NoRenderableFormat => write!(f, "No filterable render-target format available for simulation fields"),
            CapabilityError::IncompatibleSurface => write!(f, "Surface is not compatible with the selected adapter"),
        }
    }
}

impl std::error::Error for CapabilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CapabilityError::SurfaceCreation(e) => Some(e),
            CapabilityError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for CapabilityError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        CapabilityError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for CapabilityError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        CapabilityError::DeviceCreation(e)
    }
}

/// A compile or link failure for one pipeline program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDiagnostic {
    /// Program name, e.g. `"pressure"`.
    pub program: &'static str,
    /// Compiler or validation message.
    pub message: String,
}

impl fmt::Display for ProgramDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} program: {}", self.program, self.message)
    }
}

/// Errors raised inside the engine. None of these escape to the host.
#[derive(Debug)]
pub enum EngineError {
    /// No suitable GPU context or render-target format.
    CapabilityUnavailable(CapabilityError),
    /// One or more of the nine programs failed to compile or link.
    CompileLinkFailure(Vec<ProgramDiagnostic>),
    /// The GPU context was invalidated mid-session.
    ContextLost(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::CapabilityUnavailable(e) => write!(f, "GPU capability unavailable: {}", e),
            EngineError::CompileLinkFailure(diagnostics) => {
                write!(f, "{} program(s) failed to compile", diagnostics.len())?;
                for d in diagnostics {
                    write!(f, "\n  {}", d)?;
                }
                Ok(())
            }
            EngineError::ContextLost(msg) => write!(f, "GPU context lost: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::CapabilityUnavailable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CapabilityError> for EngineError {
    fn from(e: CapabilityError) -> Self {
        EngineError::CapabilityUnavailable(e)
    }
}

/// Why the effect is not running.
#[derive(Debug)]
pub enum Unavailable {
    /// The host passed `enabled: false`.
    Disabled,
    /// The host signalled a reduced-motion preference.
    ReducedMotion,
    /// Startup failed (capability or compile failure).
    Failed(EngineError),
    /// The context was lost and the single reinitialization attempt failed.
    RecoveryFailed(EngineError),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Disabled => write!(f, "effect disabled by host"),
            Unavailable::ReducedMotion => write!(f, "reduced motion requested"),
            Unavailable::Failed(e) => write!(f, "startup failed: {}", e),
            Unavailable::RecoveryFailed(e) => write!(f, "context recovery failed: {}", e),
        }
    }
}

/// The only status signal the engine reports to its host.
#[derive(Debug)]
pub enum Availability {
    /// The effect is (or will be, once the surface has a size) running.
    Available,
    /// The host should show its static presentation.
    Unavailable(Unavailable),
}

impl Availability {
    /// Whether the effect is available.
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Errors that can occur when running the demo window.
#[derive(Debug)]
pub enum RunError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            RunError::Window(e) => write!(f, "Failed to create window: {}", e),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::EventLoop(e) => Some(e),
            RunError::Window(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for RunError {
    fn from(e: winit::error::EventLoopError) -> Self {
        RunError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for RunError {
    fn from(e: winit::error::OsError) -> Self {
        RunError::Window(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_failure_lists_every_program() {
        let err = EngineError::CompileLinkFailure(vec![
            ProgramDiagnostic { program: "curl", message: "bad token".into() },
            ProgramDiagnostic { program: "splat", message: "missing entry point".into() },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 program(s) failed"));
        assert!(text.contains("curl program: bad token"));
        assert!(text.contains("splat program: missing entry point"));
    }

    #[test]
    fn test_availability_flag() {
        assert!(Availability::Available.is_available());
        assert!(!Availability::Unavailable(Unavailable::ReducedMotion).is_available());
    }
}
