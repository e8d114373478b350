//! Engine lifecycle: start/stop, deferral, failure handling and resizing.
//!
//! Uses a counting backend that records every call the engine makes, plus
//! the CPU reference backend where real field storage matters.

use std::time::{Duration, Instant};

use inkflow::error::ProgramDiagnostic;
use inkflow::field::RenderTarget;
use inkflow::pipeline::STAGE_ORDER;
use inkflow::{
    frame_stages, Availability, BlendMode, CapabilityError, EngineError, FluidEngine, FrameInput, FrameRequest, GpuBackend,
    GridSize, HostOptions, Palette, ReferenceBackend, SimulationConfig, SplatCommand, Stage, Unavailable, Vec2,
    Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Counting backend
// ============================================================================

#[derive(Default)]
struct CountingBackend {
    fail_negotiate: bool,
    fail_compile: bool,
    /// Number of upcoming frames that report a lost context.
    lose_context: u32,

    negotiations: u32,
    compiles: u32,
    allocations: u32,
    resizes: Vec<(GridSize, GridSize)>,
    surface: Option<GridSize>,
    live_fields: bool,
    releases: u32,
    frames: Vec<Vec<Stage>>,
    deltas: Vec<f32>,
}

impl GpuBackend for CountingBackend {
    fn negotiate(&mut self) -> Result<(), EngineError> {
        self.negotiations += 1;
        if self.fail_negotiate {
            return Err(CapabilityError::NoAdapter.into());
        }
        Ok(())
    }

    fn compile_programs(&mut self) -> Result<(), EngineError> {
        self.compiles += 1;
        if self.fail_compile {
            return Err(EngineError::CompileLinkFailure(vec![ProgramDiagnostic {
                program: "pressure",
                message: "forced failure".into(),
            }]));
        }
        Ok(())
    }

    fn allocate_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        assert!(!self.live_fields, "fields allocated twice without release");
        self.allocations += 1;
        self.live_fields = true;
        self.resizes.push((sim, dye));
        Ok(())
    }

    fn resize_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        assert!(self.live_fields);
        self.resizes.push((sim, dye));
        Ok(())
    }

    fn configure_surface(&mut self, size: GridSize) {
        self.surface = Some(size);
    }

    fn run_frame(&mut self, frame: &FrameInput<'_>) -> Result<(), EngineError> {
        assert!(self.live_fields, "frame ran without fields");
        if self.lose_context > 0 {
            self.lose_context -= 1;
            return Err(EngineError::ContextLost("forced".into()));
        }
        self.frames.push(frame_stages(frame).collect());
        self.deltas.push(frame.dt);
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
        self.live_fields = false;
        self.surface = None;
    }

    fn max_grid_dimension(&self) -> u32 {
        1024
    }
}

fn quiet_config() -> SimulationConfig {
    SimulationConfig {
        idle: None,
        ..SimulationConfig::ink()
    }
}

fn engine_with(backend: CountingBackend, options: HostOptions) -> FluidEngine<CountingBackend> {
    FluidEngine::new(backend, quiet_config(), options, Palette::default())
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_start_runs_with_nonzero_surface() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(320, 240, t0);
    assert!(engine.start(t0).is_available());
    assert!(engine.is_running());

    let backend = engine.backend();
    assert_eq!(backend.negotiations, 1);
    assert_eq!(backend.compiles, 1);
    assert_eq!(backend.allocations, 1);
    assert_eq!(backend.surface, Some(GridSize::new(320, 240)));
    assert_eq!(backend.resizes[0], (GridSize::new(160, 120), GridSize::new(320, 240)));
}

#[test]
fn test_failed_negotiation_allocates_nothing() {
    let t0 = Instant::now();
    let backend = CountingBackend {
        fail_negotiate: true,
        ..Default::default()
    };
    let mut engine = engine_with(backend, HostOptions::default());
    engine.resize(320, 240, t0);

    match engine.start(t0) {
        Availability::Unavailable(Unavailable::Failed(EngineError::CapabilityUnavailable(_))) => {}
        other => panic!("unexpected status {:?}", other),
    }
    assert!(!engine.is_running());
    let backend = engine.backend();
    assert_eq!(backend.compiles, 0);
    assert_eq!(backend.allocations, 0);
    assert!(!backend.live_fields);
    assert!(backend.releases >= 1);
    assert_eq!(engine.frame(t0 + ms(16)), FrameRequest::Idle);
}

#[test]
fn test_compile_failure_aborts_startup() {
    let t0 = Instant::now();
    let backend = CountingBackend {
        fail_compile: true,
        ..Default::default()
    };
    let mut engine = engine_with(backend, HostOptions::default());
    engine.resize(320, 240, t0);

    match engine.start(t0) {
        Availability::Unavailable(Unavailable::Failed(EngineError::CompileLinkFailure(diagnostics))) => {
            assert_eq!(diagnostics[0].program, "pressure");
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(engine.backend().allocations, 0);
}

#[test]
fn test_disabled_never_touches_backend() {
    let t0 = Instant::now();
    let options = HostOptions {
        enabled: false,
        ..HostOptions::default()
    };
    let mut engine = engine_with(CountingBackend::default(), options);
    engine.resize(320, 240, t0);

    assert!(matches!(engine.start(t0), Availability::Unavailable(Unavailable::Disabled)));
    assert_eq!(engine.backend().negotiations, 0);
    assert_eq!(engine.frame(t0), FrameRequest::Idle);
}

#[test]
fn test_reduced_motion_never_starts() {
    let t0 = Instant::now();
    let options = HostOptions {
        reduced_motion: true,
        ..HostOptions::default()
    };
    let mut engine = engine_with(CountingBackend::default(), options);
    engine.resize(320, 240, t0);

    assert!(matches!(engine.start(t0), Availability::Unavailable(Unavailable::ReducedMotion)));
    assert_eq!(engine.backend().negotiations, 0);
    assert!(!engine.is_running());
}

#[test]
fn test_zero_size_defers_initialization() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());

    assert!(engine.start(t0).is_available());
    assert!(!engine.is_running());
    assert_eq!(engine.backend().negotiations, 0);

    engine.resize(0, 0, t0 + ms(5));
    assert_eq!(engine.backend().negotiations, 0);

    engine.resize(200, 100, t0 + ms(10));
    assert!(engine.is_running());
    assert_eq!(engine.backend().negotiations, 1);
    assert_eq!(engine.backend().allocations, 1);
    assert_eq!(engine.frame(t0 + ms(26)), FrameRequest::Continue);
}

#[test]
fn test_zero_size_while_running_stops_scheduling() {
    let t0 = Instant::now();
    let mut engine = FluidEngine::new(ReferenceBackend::new(), quiet_config(), HostOptions::default(), Palette::default());
    engine.resize(64, 64, t0);
    engine.start(t0);
    assert_eq!(engine.frame(t0 + ms(16)), FrameRequest::Continue);

    engine.resize(0, 0, t0 + ms(20));
    for i in 0..100u64 {
        assert_eq!(engine.frame(t0 + ms(32 + i * 16)), FrameRequest::Idle);
    }
    assert!(engine.is_running());
    assert!(engine.availability().is_available());

    let restored = t0 + ms(2000);
    engine.resize(64, 64, restored);
    assert_eq!(engine.frame(restored + ms(16)), FrameRequest::Continue);
}

#[test]
fn test_resume_after_stop_restarts() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    assert!(engine.resume(320, 240, t0).is_available());
    assert_eq!(engine.frame(t0 + ms(16)), FrameRequest::Continue);

    engine.stop();
    assert_eq!(engine.frame(t0 + ms(32)), FrameRequest::Idle);

    let later = t0 + ms(5000);
    assert!(engine.resume(640, 480, later).is_available());
    assert!(engine.is_running());
    assert_eq!(engine.frame(later + ms(16)), FrameRequest::Continue);

    let backend = engine.backend();
    assert_eq!(backend.negotiations, 2);
    assert_eq!(backend.allocations, 2);
    assert_eq!(backend.surface, Some(GridSize::new(640, 480)));
    assert_eq!(backend.resizes[1], (GridSize::new(320, 240), GridSize::new(640, 480)));
    assert_eq!(backend.frames.len(), 2);
}

#[test]
fn test_resume_while_running_keeps_context() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resume(320, 240, t0);
    assert!(engine.resume(320, 240, t0 + ms(10)).is_available());
    assert_eq!(engine.backend().negotiations, 1);
    assert_eq!(engine.backend().allocations, 1);
}

#[test]
fn test_stopped_engine_is_available_but_not_running() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resume(320, 240, t0);
    engine.stop();
    assert!(!engine.is_running());
    assert!(engine.availability().is_available());
}

#[test]
fn test_compositing_options_do_not_change_frames() {
    let t0 = Instant::now();
    let composited = HostOptions {
        opacity: 0.25,
        blend_mode: BlendMode::Multiply,
        ..HostOptions::default()
    };
    let mut plain = engine_with(CountingBackend::default(), HostOptions::default());
    let mut blended = engine_with(CountingBackend::default(), composited);

    for engine in [&mut plain, &mut blended] {
        engine.resume(320, 240, t0);
        engine.push_splat(SplatCommand::new(Vec2::splat(0.5), Vec2::ZERO, Vec3::ONE, 0.1));
        engine.frame(t0 + ms(16));
        engine.frame(t0 + ms(32));
    }

    assert_eq!(blended.options().opacity, 0.25);
    assert_eq!(plain.backend().frames, blended.backend().frames);
    assert_eq!(plain.backend().deltas, blended.backend().deltas);
    assert_eq!(plain.backend().resizes, blended.backend().resizes);
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_stage_order_with_and_without_splats() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(128, 128, t0);
    engine.start(t0);

    engine.frame(t0 + ms(16));
    engine.push_splat(SplatCommand::new(Vec2::splat(0.5), Vec2::new(10.0, 0.0), Vec3::ONE, 0.05));
    assert_eq!(engine.pending_splats(), 1);
    engine.frame(t0 + ms(32));
    assert_eq!(engine.pending_splats(), 0);

    let frames = &engine.backend().frames;
    assert_eq!(frames.len(), 2);
    assert!(!frames[0].contains(&Stage::Splat));
    assert_eq!(frames[0].len(), 8);
    assert_eq!(frames[1], STAGE_ORDER.to_vec());
}

#[test]
fn test_splats_dropped_while_stopped() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(128, 128, t0);
    engine.push_splat(SplatCommand::new(Vec2::splat(0.5), Vec2::ZERO, Vec3::ONE, 0.05));
    engine.on_pointer_move(10.0, 10.0, 4.0, 0.0);
    assert_eq!(engine.pending_splats(), 0);
}

#[test]
fn test_pointer_motion_queues_splat() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(128, 128, t0);
    engine.start(t0);

    engine.on_pointer_move(64.0, 64.0, 5.0, -3.0);
    assert_eq!(engine.pending_splats(), 1);
    // Outside the surface.
    engine.on_pointer_move(500.0, 64.0, 5.0, -3.0);
    assert_eq!(engine.pending_splats(), 1);
}

#[test]
fn test_calm_preset_ignores_pointer_but_keeps_idle_motion() {
    let t0 = Instant::now();
    let config = SimulationConfig::calm();
    assert!(!config.pointer_splats);
    assert!(config.idle.is_some());

    let mut engine = FluidEngine::new(CountingBackend::default(), config, HostOptions::default(), Palette::default());
    engine.resize(128, 128, t0);
    engine.start(t0);
    engine.on_pointer_move(64.0, 64.0, 5.0, -3.0);
    assert_eq!(engine.pending_splats(), 0);

    for i in 1..=30 {
        engine.frame(t0 + ms(16 * i));
    }
    let splat_frames = engine
        .backend()
        .frames
        .iter()
        .filter(|stages| stages.contains(&Stage::Splat))
        .count();
    assert!(splat_frames > 0, "idle motion never splatted");
}

#[test]
fn test_frame_delta_is_clamped() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(64, 64, t0);
    engine.start(t0);

    engine.frame(t0 + ms(16));
    engine.frame(t0 + ms(2016));
    let deltas = &engine.backend().deltas;
    assert!((deltas[0] - 0.016).abs() < 1e-3);
    assert!(deltas[1] <= 0.033 + 1e-6, "delta {} not clamped", deltas[1]);
}

#[test]
fn test_palette_swap_does_not_restart() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(64, 64, t0);
    engine.start(t0);

    let palette = Palette::from_hex(Some("#ff0000"), Some("#00ff00"));
    engine.set_palette(palette);
    assert_eq!(*engine.palette(), palette);
    assert!(engine.is_running());
    assert_eq!(engine.backend().negotiations, 1);
}

// ============================================================================
// Context loss
// ============================================================================

#[test]
fn test_context_loss_recovers_once() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(64, 64, t0);
    engine.start(t0);

    engine.backend_mut().lose_context = 1;
    assert_eq!(engine.frame(t0 + ms(16)), FrameRequest::Continue);
    assert!(engine.is_running());
    assert!(engine.availability().is_available());
    assert_eq!(engine.backend().negotiations, 2);
    assert!(engine.backend().live_fields);

    engine.backend_mut().lose_context = 1;
    assert_eq!(engine.frame(t0 + ms(32)), FrameRequest::Idle);
    assert!(!engine.is_running());
    assert!(matches!(
        engine.availability(),
        Availability::Unavailable(Unavailable::RecoveryFailed(EngineError::ContextLost(_)))
    ));
    assert!(!engine.backend().live_fields);
    assert_eq!(engine.backend().negotiations, 2);
}

#[test]
fn test_failed_recovery_is_permanent() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(64, 64, t0);
    engine.start(t0);

    {
        let backend = engine.backend_mut();
        backend.lose_context = 1;
        backend.fail_negotiate = true;
    }
    assert_eq!(engine.frame(t0 + ms(16)), FrameRequest::Idle);
    assert!(matches!(
        engine.availability(),
        Availability::Unavailable(Unavailable::RecoveryFailed(_))
    ));

    engine.backend_mut().fail_negotiate = false;
    assert!(!engine.start(t0 + ms(100)).is_available());
    assert_eq!(engine.backend().negotiations, 2);
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_waits_for_quiet_window() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(200, 200, t0);
    engine.start(t0);

    engine.resize(100, 100, t0 + ms(10));
    assert_eq!(engine.backend().surface, Some(GridSize::new(100, 100)));
    engine.frame(t0 + ms(20));
    assert_eq!(engine.backend().resizes.len(), 1);

    // A second event resets the window.
    engine.resize(80, 60, t0 + ms(100));
    engine.frame(t0 + ms(200));
    assert_eq!(engine.backend().resizes.len(), 1);

    engine.frame(t0 + ms(260));
    let resizes = &engine.backend().resizes;
    assert_eq!(resizes.len(), 2);
    assert_eq!(resizes[1], (GridSize::new(40, 30), GridSize::new(80, 60)));
}

#[test]
fn test_stop_mid_debounce_drops_pending_resize() {
    let t0 = Instant::now();
    let mut engine = engine_with(CountingBackend::default(), HostOptions::default());
    engine.resize(200, 200, t0);
    engine.start(t0);
    engine.resize(100, 100, t0 + ms(10));
    engine.stop();

    assert!(!engine.backend().live_fields);
    assert_eq!(engine.frame(t0 + ms(500)), FrameRequest::Idle);
    assert_eq!(engine.backend().resizes.len(), 1);
}

#[test]
fn test_random_resizes_keep_pairs_consistent() {
    let mut rng = StdRng::seed_from_u64(42);
    let t0 = Instant::now();
    let mut now = t0;
    let mut engine = FluidEngine::new(ReferenceBackend::new(), quiet_config(), HostOptions::default(), Palette::default());
    engine.resize(48, 32, now);
    engine.start(now);

    for _ in 0..200 {
        now += ms(rng.gen_range(1..80));
        if rng.gen_bool(0.4) {
            let w = if rng.gen_bool(0.1) { 0 } else { rng.gen_range(1..96) };
            let h = rng.gen_range(1..96);
            engine.resize(w, h, now);
        }
        if rng.gen_bool(0.3) {
            engine.push_splat(SplatCommand::new(
                Vec2::new(rng.gen(), rng.gen()),
                Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)),
                Vec3::new(rng.gen(), rng.gen(), rng.gen()),
                0.05,
            ));
        }
        let expected = if engine.surface_size().is_some() {
            FrameRequest::Continue
        } else {
            FrameRequest::Idle
        };
        assert_eq!(engine.frame(now), expected);

        let fields = engine.backend().fields().unwrap();
        assert!(fields.is_consistent());
        assert_eq!(fields.velocity.read().size(), fields.velocity.write().size());
        assert_eq!(fields.dye.read().size(), fields.dye.write().size());
    }
}

#[test]
fn test_start_stop_cycles_release_everything() {
    let t0 = Instant::now();
    let mut engine = FluidEngine::new(ReferenceBackend::new(), quiet_config(), HostOptions::default(), Palette::default());
    engine.resize(64, 48, t0);

    for cycle in 0..5u64 {
        let start = t0 + ms(cycle * 1000);
        assert!(engine.start(start).is_available());
        engine.frame(start + ms(16));
        engine.resize(32 + cycle as u32 * 8, 48, start + ms(20));
        engine.frame(start + ms(400));
        engine.stop();

        let factory = engine.backend().factory();
        assert_eq!(factory.live(), 0, "cycle {} leaked targets", cycle);
        assert_eq!(factory.created(), factory.released());
    }
    assert!(engine.backend().fields().is_none());
}

#[test]
fn test_engines_are_independent() {
    let t0 = Instant::now();
    let mut a = FluidEngine::new(ReferenceBackend::new(), quiet_config(), HostOptions::default(), Palette::default());
    let mut b = FluidEngine::new(ReferenceBackend::new(), quiet_config(), HostOptions::default(), Palette::default());
    a.resize(64, 64, t0);
    b.resize(32, 16, t0);
    a.start(t0);
    b.start(t0);

    a.push_splat(SplatCommand::new(Vec2::splat(0.5), Vec2::ZERO, Vec3::ONE, 0.1));
    a.frame(t0 + ms(16));
    b.frame(t0 + ms(16));

    assert!(a.backend().fields().unwrap().dye.read().max_rgb() > 0.5);
    assert_eq!(b.backend().fields().unwrap().dye.read().max_rgb(), 0.0);
    assert_eq!(b.backend().fields().unwrap().dye_size(), GridSize::new(32, 16));

    a.stop();
    assert!(b.is_running());
    assert_eq!(b.frame(t0 + ms(32)), FrameRequest::Continue);
}
