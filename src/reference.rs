//! CPU reference solver.
//!
//! Runs the same nine passes as the GPU programs, texel for texel, on plain
//! `Vec4` grids. The numerical properties of the solver are tested here, and
//! [`ReferenceBackend`] lets the engine run headless (benchmarks, CI without
//! an adapter).
//!
//! Sampling mirrors a clamp-to-edge linear sampler: neighbour reads at texel
//! centres are exact, off-centre reads are bilinear.

use glam::{Vec2, Vec3, Vec4};

use crate::backend::GpuBackend;
use crate::error::EngineError;
use crate::field::{FieldAllocator, FieldSet, GridSize, RenderTarget, TargetDesc, TargetFactory};
use crate::pipeline::{frame_stages, FrameInput, Stage};
use crate::splat::SplatCommand;
use crate::visuals::DisplayConfig;

/// Largest grid side the reference backend accepts.
pub const MAX_REFERENCE_DIMENSION: u32 = 4096;

const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// A 2D grid of RGBA texels, row-major, origin top-left.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    size: GridSize,
    data: Vec<Vec4>,
}

impl Grid {
    /// Zeroed grid.
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            data: vec![Vec4::ZERO; size.cells()],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }

    /// Texel at integer coordinates, clamped to the edge.
    #[inline]
    pub fn at(&self, x: i64, y: i64) -> Vec4 {
        let x = x.clamp(0, self.size.width as i64 - 1) as u32;
        let y = y.clamp(0, self.size.height as i64 - 1) as u32;
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    pub fn fill(&mut self, value: Vec4) {
        self.data.fill(value);
    }

    /// Normalized coordinates of a texel centre.
    #[inline]
    pub fn uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.size.width as f32,
            (y as f32 + 0.5) / self.size.height as f32,
        )
    }

    /// Bilinear sample at normalized coordinates, clamp-to-edge.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let fx = uv.x * self.size.width as f32 - 0.5;
        let fy = uv.y * self.size.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self.at(x0, y0).lerp(self.at(x0 + 1, y0), tx);
        let bottom = self.at(x0, y0 + 1).lerp(self.at(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }

    /// Overwrite every texel with `f(x, y, uv)`.
    pub fn fill_with(&mut self, mut f: impl FnMut(i64, i64, Vec2) -> Vec4) {
        let (w, h) = (self.size.width, self.size.height);
        for y in 0..h {
            for x in 0..w {
                let uv = self.uv(x, y);
                let i = self.index(x, y);
                self.data[i] = f(x as i64, y as i64, uv);
            }
        }
    }

    pub fn data(&self) -> &[Vec4] {
        &self.data
    }

    /// Sum of Rec. 709 luminance over every texel.
    pub fn total_luminance(&self) -> f64 {
        self.data.iter().map(|v| v.truncate().dot(LUMA) as f64).sum()
    }

    /// Largest RGB component anywhere in the grid.
    pub fn max_rgb(&self) -> f32 {
        self.data.iter().map(|v| v.truncate().max_element()).fold(0.0, f32::max)
    }

    /// Sum of squares of the first channel.
    pub fn energy(&self) -> f64 {
        self.data.iter().map(|v| (v.x as f64) * (v.x as f64)).sum()
    }
}

impl RenderTarget for Grid {
    fn size(&self) -> GridSize {
        self.size
    }
}

/// Creates zeroed [`Grid`]s and counts what it hands out.
#[derive(Debug, Default)]
pub struct CpuFactory {
    created: usize,
    released: usize,
}

impl CpuFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn released(&self) -> usize {
        self.released
    }

    /// Targets created and not yet released.
    pub fn live(&self) -> usize {
        self.created - self.released
    }
}

impl TargetFactory for CpuFactory {
    type Target = Grid;

    fn create_target(&mut self, desc: &TargetDesc) -> Grid {
        self.created += 1;
        Grid::new(desc.size)
    }

    fn release_target(&mut self, target: Grid) {
        self.released += 1;
        drop(target);
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Velocity → curl.
pub fn curl_pass(velocity: &Grid, out: &mut Grid) {
    out.fill_with(|x, y, _| {
        let l = velocity.at(x - 1, y).y;
        let r = velocity.at(x + 1, y).y;
        let up = velocity.at(x, y - 1).x;
        let down = velocity.at(x, y + 1).x;
        Vec4::new(0.5 * ((r - l) - (down - up)), 0.0, 0.0, 1.0)
    });
}

/// Adds the vorticity confinement force to velocity.
pub fn vorticity_pass(velocity: &Grid, curl: &Grid, out: &mut Grid, curl_strength: f32, dt: f32) {
    out.fill_with(|x, y, _| {
        let l = curl.at(x - 1, y).x.abs();
        let r = curl.at(x + 1, y).x.abs();
        let up = curl.at(x, y - 1).x.abs();
        let down = curl.at(x, y + 1).x.abs();
        let c = curl.at(x, y).x;

        let mut g = 0.5 * Vec2::new(r - l, down - up);
        g /= g.length() + 1e-4;
        let force = curl_strength * c * Vec2::new(g.y, -g.x);

        let vel = velocity.at(x, y).truncate().truncate() + force * dt;
        Vec4::new(vel.x, vel.y, 0.0, 1.0)
    });
}

/// Velocity → divergence with no-flow walls.
pub fn divergence_pass(velocity: &Grid, out: &mut Grid) {
    let size = velocity.size();
    let (last_x, last_y) = (size.width as i64 - 1, size.height as i64 - 1);
    out.fill_with(|x, y, _| {
        let c = velocity.at(x, y);
        let l = if x == 0 { -c.x } else { velocity.at(x - 1, y).x };
        let r = if x == last_x { -c.x } else { velocity.at(x + 1, y).x };
        let up = if y == 0 { -c.y } else { velocity.at(x, y - 1).y };
        let down = if y == last_y { -c.y } else { velocity.at(x, y + 1).y };
        Vec4::new(0.5 * ((r - l) + (down - up)), 0.0, 0.0, 1.0)
    });
}

/// `out = value · source`.
pub fn blit_pass(source: &Grid, out: &mut Grid, value: f32) {
    out.fill_with(|x, y, _| value * source.at(x, y));
}

/// One Jacobi iteration.
pub fn jacobi_pass(pressure: &Grid, divergence: &Grid, out: &mut Grid) {
    out.fill_with(|x, y, _| {
        let l = pressure.at(x - 1, y).x;
        let r = pressure.at(x + 1, y).x;
        let up = pressure.at(x, y - 1).x;
        let down = pressure.at(x, y + 1).x;
        let div = divergence.at(x, y).x;
        Vec4::new((l + r + up + down - div) * 0.25, 0.0, 0.0, 1.0)
    });
}

/// Velocity minus the pressure gradient.
pub fn gradient_subtract_pass(pressure: &Grid, velocity: &Grid, out: &mut Grid) {
    out.fill_with(|x, y, _| {
        let l = pressure.at(x - 1, y).x;
        let r = pressure.at(x + 1, y).x;
        let up = pressure.at(x, y - 1).x;
        let down = pressure.at(x, y + 1).x;
        let vel = velocity.at(x, y);
        Vec4::new(vel.x - 0.5 * (r - l), vel.y - 0.5 * (down - up), 0.0, 1.0)
    });
}

/// Semi-Lagrangian advection of `source` by `velocity`.
pub fn advect_pass(velocity: &Grid, source: &Grid, out: &mut Grid, dt: f32, dissipation: f32) {
    let sim_texel = velocity.size().texel_size();
    out.fill_with(|_, _, uv| {
        let vel = velocity.sample(uv).truncate().truncate();
        let coord = uv - dt * vel * sim_texel;
        dissipation * source.sample(coord)
    });
}

/// Adds one Gaussian splat carrying `payload`.
pub fn splat_pass(source: &Grid, out: &mut Grid, splat: &SplatCommand, payload: Vec3) {
    let aspect = source.size().aspect();
    out.fill_with(|x, y, uv| {
        let w = splat.weight_at(uv, aspect);
        let base = source.at(x, y);
        (base.truncate() + w * payload).extend(1.0)
    });
}

/// Dye → displayed colour with premultiplied-style alpha.
pub fn display_pass(dye: &Grid, out: &mut Grid, display: &DisplayConfig, time: f32) {
    let texel = dye.size().texel_size();
    out.fill_with(|x, y, uv| {
        let rgb = |p: Vec2| dye.sample(p).truncate();
        let mut c = rgb(uv);

        if display.shading {
            let tx = Vec2::new(texel.x, 0.0);
            let ty = Vec2::new(0.0, texel.y);
            let dx = rgb(uv + tx).length() - rgb(uv - tx).length();
            let dy = rgb(uv + ty).length() - rgb(uv - ty).length();
            let n = Vec3::new(dx, dy, texel.length()).normalize();
            let diffuse = (n.z + 0.7).clamp(0.7, 1.0);
            c *= diffuse;
        }

        let d = uv.distance(Vec2::splat(0.5));
        c *= 1.0 - display.vignette * smoothstep(0.3, 0.75, d);

        if display.dithering {
            let p = Vec2::new(x as f32 + 0.5 + time, y as f32 + 0.5 + time);
            let noise = (p.dot(Vec2::new(12.9898, 78.233)).sin() * 43758.5453).fract().abs();
            c += Vec3::splat((noise - 0.5) / 255.0);
        }

        let c = c.max(Vec3::ZERO);
        c.extend(c.max_element().clamp(0.0, 1.0))
    });
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Run one stage against a field set.
pub fn run_stage(fields: &mut FieldSet<Grid>, stage: Stage, frame: &FrameInput<'_>, output: Option<&mut Grid>) {
    let config = frame.config;
    match stage {
        Stage::Curl => {
            let (_, out) = fields.curl.split();
            curl_pass(fields.velocity.read(), out);
            fields.curl.swap();
        }
        Stage::Vorticity => {
            let (vel, out) = fields.velocity.split();
            vorticity_pass(vel, fields.curl.read(), out, config.curl_strength, frame.dt);
            fields.velocity.swap();
        }
        Stage::Divergence => {
            let (_, out) = fields.divergence.split();
            divergence_pass(fields.velocity.read(), out);
            fields.divergence.swap();
        }
        Stage::Pressure => {
            let (p, out) = fields.pressure.split();
            blit_pass(p, out, config.pressure_fade);
            fields.pressure.swap();
            for _ in 0..config.pressure_iterations {
                let (p, out) = fields.pressure.split();
                jacobi_pass(p, fields.divergence.read(), out);
                fields.pressure.swap();
            }
        }
        Stage::GradientSubtract => {
            let (vel, out) = fields.velocity.split();
            gradient_subtract_pass(fields.pressure.read(), vel, out);
            fields.velocity.swap();
        }
        Stage::AdvectVelocity => {
            let (vel, out) = fields.velocity.split();
            advect_pass(vel, vel, out, frame.dt, config.velocity_dissipation);
            fields.velocity.swap();
        }
        Stage::AdvectDye => {
            let (dye, out) = fields.dye.split();
            advect_pass(fields.velocity.read(), dye, out, frame.dt, config.dye_dissipation);
            fields.dye.swap();
        }
        Stage::Splat => {
            for splat in frame.splats {
                let (vel, out) = fields.velocity.split();
                splat_pass(vel, out, splat, splat.impulse.extend(0.0));
                fields.velocity.swap();

                let (dye, out) = fields.dye.split();
                splat_pass(dye, out, splat, splat.color);
                fields.dye.swap();
            }
        }
        Stage::Display => {
            if let Some(out) = output {
                display_pass(fields.dye.read(), out, &config.display, frame.elapsed);
            }
        }
    }
}

/// Owns a field set and steps it frame by frame.
pub struct Solver {
    factory: CpuFactory,
    fields: FieldAllocator<Grid>,
    output: Option<Grid>,
}

impl Solver {
    pub fn new(sim: GridSize, dye: GridSize) -> Self {
        let mut factory = CpuFactory::new();
        let mut fields = FieldAllocator::new();
        fields.allocate(&mut factory, sim, dye);
        Self {
            factory,
            fields,
            output: None,
        }
    }

    /// Also render the display stage into a grid of `size`.
    pub fn with_output(mut self, size: GridSize) -> Self {
        self.output = Some(Grid::new(size));
        self
    }

    /// Run every stage of one frame.
    pub fn step(&mut self, frame: &FrameInput<'_>) {
        let Some(fields) = self.fields.fields_mut() else {
            return;
        };
        for stage in frame_stages(frame) {
            run_stage(fields, stage, frame, self.output.as_mut());
        }
    }

    /// Run a single stage, for inspecting intermediate state.
    pub fn run_stage(&mut self, stage: Stage, frame: &FrameInput<'_>) {
        if let Some(fields) = self.fields.fields_mut() {
            run_stage(fields, stage, frame, self.output.as_mut());
        }
    }

    pub fn fields(&self) -> Option<&FieldSet<Grid>> {
        self.fields.fields()
    }

    pub fn fields_mut(&mut self) -> Option<&mut FieldSet<Grid>> {
        self.fields.fields_mut()
    }

    pub fn output(&self) -> Option<&Grid> {
        self.output.as_ref()
    }

    pub fn resize(&mut self, sim: GridSize, dye: GridSize) {
        self.fields.resize(&mut self.factory, sim, dye);
    }

    pub fn release(&mut self) {
        self.fields.release(&mut self.factory);
    }

    pub fn factory(&self) -> &CpuFactory {
        &self.factory
    }

    /// Divergence energy of the current velocity, without touching any field.
    pub fn residual_divergence(&self) -> f64 {
        let Some(fields) = self.fields.fields() else {
            return 0.0;
        };
        let velocity = fields.velocity.read();
        let mut scratch = Grid::new(velocity.size());
        divergence_pass(velocity, &mut scratch);
        scratch.energy()
    }
}

/// Headless [`GpuBackend`] backed by the reference solver.
pub struct ReferenceBackend {
    factory: CpuFactory,
    fields: FieldAllocator<Grid>,
    output: Option<Grid>,
    compiled: bool,
    frames: u64,
}

impl ReferenceBackend {
    pub fn new() -> Self {
        Self {
            factory: CpuFactory::new(),
            fields: FieldAllocator::new(),
            output: None,
            compiled: false,
            frames: 0,
        }
    }

    pub fn fields(&self) -> Option<&FieldSet<Grid>> {
        self.fields.fields()
    }

    /// The last displayed frame.
    pub fn output(&self) -> Option<&Grid> {
        self.output.as_ref()
    }

    pub fn factory(&self) -> &CpuFactory {
        &self.factory
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for ReferenceBackend {
    fn negotiate(&mut self) -> Result<(), EngineError> {
        log::debug!("Reference backend: nothing to negotiate");
        Ok(())
    }

    fn compile_programs(&mut self) -> Result<(), EngineError> {
        self.compiled = true;
        Ok(())
    }

    fn allocate_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        self.fields.allocate(&mut self.factory, sim, dye);
        Ok(())
    }

    fn resize_fields(&mut self, sim: GridSize, dye: GridSize) -> Result<(), EngineError> {
        self.fields.resize(&mut self.factory, sim, dye);
        Ok(())
    }

    fn configure_surface(&mut self, size: GridSize) {
        if self.output.as_ref().map(|grid| grid.size()) != Some(size) {
            self.output = Some(Grid::new(size));
        }
    }

    fn run_frame(&mut self, frame: &FrameInput<'_>) -> Result<(), EngineError> {
        let Some(fields) = self.fields.fields_mut() else {
            return Ok(());
        };
        for stage in frame_stages(frame) {
            run_stage(fields, stage, frame, self.output.as_mut());
        }
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.fields.release(&mut self.factory);
        self.output = None;
        self.compiled = false;
    }

    fn max_grid_dimension(&self) -> u32 {
        MAX_REFERENCE_DIMENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_at_centres_is_exact() {
        let mut grid = Grid::new(GridSize::new(4, 3));
        grid.set(2, 1, Vec4::ONE);
        assert_eq!(grid.sample(grid.uv(2, 1)), Vec4::ONE);
        assert_eq!(grid.sample(grid.uv(1, 1)), Vec4::ZERO);
    }

    #[test]
    fn test_sample_between_centres_is_bilinear() {
        let mut grid = Grid::new(GridSize::new(2, 1));
        grid.set(1, 0, Vec4::splat(2.0));
        let mid = (grid.uv(0, 0) + grid.uv(1, 0)) * 0.5;
        assert!((grid.sample(mid).x - 1.0).abs() < 1e-6);
        // Clamped outside the grid.
        assert_eq!(grid.sample(Vec2::new(5.0, 0.5)), Vec4::splat(2.0));
    }

    #[test]
    fn test_uniform_flow_has_no_interior_divergence() {
        let size = GridSize::square(8);
        let mut velocity = Grid::new(size);
        velocity.fill(Vec4::new(1.0, 0.0, 0.0, 0.0));
        let mut div = Grid::new(size);
        divergence_pass(&velocity, &mut div);
        assert_eq!(div.at(4, 4).x, 0.0);
        // Walls mirror the normal component.
        assert_eq!(div.at(0, 4).x, 1.0);
        assert_eq!(div.at(7, 4).x, -1.0);
    }

    #[test]
    fn test_rigid_rotation_curl_sign() {
        let size = GridSize::square(16);
        let mut velocity = Grid::new(size);
        // Clockwise on screen (y down): v = (-(y - c), x - c).
        velocity.fill_with(|x, y, _| Vec4::new(-(y as f32 - 7.5), x as f32 - 7.5, 0.0, 0.0));
        let mut curl = Grid::new(size);
        curl_pass(&velocity, &mut curl);
        // Unit angular velocity has vorticity 2.
        assert!((curl.at(8, 8).x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_factory_counts() {
        let mut solver = Solver::new(GridSize::square(8), GridSize::square(16));
        assert_eq!(solver.factory().live(), 10);
        solver.resize(GridSize::square(4), GridSize::square(4));
        assert_eq!(solver.factory().created(), 20);
        assert_eq!(solver.factory().live(), 10);
        solver.release();
        assert_eq!(solver.factory().live(), 0);
    }
}
