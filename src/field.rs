//! Simulated fields and their double-buffered render targets.
//!
//! Every simulated quantity is stored as a pair of render targets: one is the
//! current (read) buffer, the other is written by the next pass and then the
//! pair swaps. Targets are created through a [`TargetFactory`] so the same
//! allocation logic drives GPU textures and the CPU reference grids.
//!
//! # Resolutions
//!
//! - **Simulation resolution**: velocity, pressure, divergence and curl.
//! - **Display resolution**: dye, usually finer than the simulation grid.
//!
//! ```ignore
//! let surface = GridSize::new(1920, 1080);
//! let sim = surface.scaled(0.5, 4096);   // 960x540
//! let dye = surface.scaled(1.0, 4096);   // 1920x1080
//! let mut allocator = FieldAllocator::new();
//! allocator.allocate(&mut factory, sim, dye);
//! ```

use glam::Vec2;

/// Simulated quantity stored in a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// 2-channel flow vector, simulation resolution.
    Velocity,
    /// RGB(A) colour, display resolution.
    Dye,
    /// Scalar pressure, simulation resolution.
    Pressure,
    /// Scalar divergence, simulation resolution.
    Divergence,
    /// Scalar vorticity, simulation resolution.
    Curl,
}

impl FieldKind {
    /// All field kinds in allocation order.
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Velocity,
        FieldKind::Dye,
        FieldKind::Pressure,
        FieldKind::Divergence,
        FieldKind::Curl,
    ];

    /// Whether the field lives on the display (dye) grid.
    pub fn is_display_resolution(&self) -> bool {
        matches!(self, FieldKind::Dye)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Velocity => "velocity",
            FieldKind::Dye => "dye",
            FieldKind::Pressure => "pressure",
            FieldKind::Divergence => "divergence",
            FieldKind::Curl => "curl",
        }
    }
}

/// Width and height of a grid in texels. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    /// Create a grid size, raising zero dimensions to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Square grid.
    pub fn square(n: u32) -> Self {
        Self::new(n, n)
    }

    /// Scale this size by `scale`, capping each side at `max_dimension`.
    pub fn scaled(&self, scale: f32, max_dimension: u32) -> Self {
        let dim = |v: u32| -> u32 {
            let scaled = (v as f32 * scale).round() as u32;
            scaled.clamp(1, max_dimension.max(1))
        };
        Self {
            width: dim(self.width),
            height: dim(self.height),
        }
    }

    /// Size of one texel in normalized coordinates.
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Total texel count.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Which half of a pair a target belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

/// Everything a factory needs to create one render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub kind: FieldKind,
    pub size: GridSize,
    pub slot: Slot,
}

/// A surface one pass can render into and later passes can sample.
pub trait RenderTarget {
    fn size(&self) -> GridSize;
}

/// Creates and destroys render targets.
///
/// Targets start zeroed. `release_target` must free the underlying storage
/// before returning.
pub trait TargetFactory {
    type Target: RenderTarget;

    fn create_target(&mut self, desc: &TargetDesc) -> Self::Target;

    fn release_target(&mut self, target: Self::Target);
}

/// A read/write pair of render targets.
///
/// Exactly one target is current (`read`) at any time; passes render into
/// `write` and then call [`swap`](Self::swap).
pub struct DoubleBuffer<T> {
    a: T,
    b: T,
    /// Which target is currently the "read" target (false = A, true = B)
    read_is_b: bool,
}

impl<T> DoubleBuffer<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            read_is_b: false,
        }
    }

    /// The current target.
    pub fn read(&self) -> &T {
        if self.read_is_b {
            &self.b
        } else {
            &self.a
        }
    }

    /// The target the next pass renders into.
    pub fn write(&self) -> &T {
        if self.read_is_b {
            &self.a
        } else {
            &self.b
        }
    }

    pub fn read_mut(&mut self) -> &mut T {
        if self.read_is_b {
            &mut self.b
        } else {
            &mut self.a
        }
    }

    /// Borrow the read target immutably and the write target mutably.
    pub fn split(&mut self) -> (&T, &mut T) {
        if self.read_is_b {
            (&self.b, &mut self.a)
        } else {
            (&self.a, &mut self.b)
        }
    }

    /// Make the write target current.
    pub fn swap(&mut self) {
        self.read_is_b = !self.read_is_b;
    }

    /// Which slot is currently read.
    pub fn read_slot(&self) -> Slot {
        if self.read_is_b {
            Slot::B
        } else {
            Slot::A
        }
    }

    pub fn into_targets(self) -> (T, T) {
        (self.a, self.b)
    }
}

impl<T: RenderTarget> DoubleBuffer<T> {
    fn allocate<F: TargetFactory<Target = T>>(factory: &mut F, kind: FieldKind, size: GridSize) -> Self {
        let a = factory.create_target(&TargetDesc { kind, size, slot: Slot::A });
        let b = factory.create_target(&TargetDesc { kind, size, slot: Slot::B });
        Self::new(a, b)
    }

    /// Size of the pair, `None` if the two halves disagree.
    pub fn size(&self) -> Option<GridSize> {
        let size = self.a.size();
        (size == self.b.size()).then_some(size)
    }
}

/// All simulated fields of one engine instance.
pub struct FieldSet<T> {
    pub velocity: DoubleBuffer<T>,
    pub dye: DoubleBuffer<T>,
    pub pressure: DoubleBuffer<T>,
    pub divergence: DoubleBuffer<T>,
    pub curl: DoubleBuffer<T>,
    sim_size: GridSize,
    dye_size: GridSize,
}

impl<T: RenderTarget> FieldSet<T> {
    /// Create every field, zeroed.
    pub fn allocate<F: TargetFactory<Target = T>>(factory: &mut F, sim: GridSize, dye: GridSize) -> Self {
        Self {
            velocity: DoubleBuffer::allocate(factory, FieldKind::Velocity, sim),
            dye: DoubleBuffer::allocate(factory, FieldKind::Dye, dye),
            pressure: DoubleBuffer::allocate(factory, FieldKind::Pressure, sim),
            divergence: DoubleBuffer::allocate(factory, FieldKind::Divergence, sim),
            curl: DoubleBuffer::allocate(factory, FieldKind::Curl, sim),
            sim_size: sim,
            dye_size: dye,
        }
    }

    /// Destroy every target.
    pub fn release<F: TargetFactory<Target = T>>(self, factory: &mut F) {
        for pair in [self.velocity, self.dye, self.pressure, self.divergence, self.curl] {
            let (a, b) = pair.into_targets();
            factory.release_target(a);
            factory.release_target(b);
        }
    }

    pub fn sim_size(&self) -> GridSize {
        self.sim_size
    }

    pub fn dye_size(&self) -> GridSize {
        self.dye_size
    }

    pub fn pair(&self, kind: FieldKind) -> &DoubleBuffer<T> {
        match kind {
            FieldKind::Velocity => &self.velocity,
            FieldKind::Dye => &self.dye,
            FieldKind::Pressure => &self.pressure,
            FieldKind::Divergence => &self.divergence,
            FieldKind::Curl => &self.curl,
        }
    }

    /// Both halves of every pair match, and each pair sits on its grid.
    pub fn is_consistent(&self) -> bool {
        FieldKind::ALL.iter().all(|&kind| {
            let expected = if kind.is_display_resolution() {
                self.dye_size
            } else {
                self.sim_size
            };
            self.pair(kind).size() == Some(expected)
        })
    }
}

/// Owns the [`FieldSet`] and replaces it atomically on resize.
pub struct FieldAllocator<T> {
    fields: Option<FieldSet<T>>,
    generation: u64,
}

impl<T: RenderTarget> FieldAllocator<T> {
    pub fn new() -> Self {
        Self {
            fields: None,
            generation: 0,
        }
    }

    /// Allocate the initial set (or replace the current one).
    pub fn allocate<F: TargetFactory<Target = T>>(&mut self, factory: &mut F, sim: GridSize, dye: GridSize) {
        self.resize(factory, sim, dye);
    }

    /// Build the new set, rebind it, then destroy the old targets.
    ///
    /// Contents are reset. The pipeline only ever sees either the old set or
    /// the complete new one.
    pub fn resize<F: TargetFactory<Target = T>>(&mut self, factory: &mut F, sim: GridSize, dye: GridSize) {
        let next = FieldSet::allocate(factory, sim, dye);
        let previous = self.fields.replace(next);
        self.generation += 1;
        if let Some(old) = previous {
            old.release(factory);
        }
        log::debug!(
            "Allocated fields (generation {}): sim {}x{}, dye {}x{}",
            self.generation,
            sim.width,
            sim.height,
            dye.width,
            dye.height
        );
    }

    /// Destroy every target. Safe to call when nothing is allocated.
    pub fn release<F: TargetFactory<Target = T>>(&mut self, factory: &mut F) {
        if let Some(old) = self.fields.take() {
            old.release(factory);
        }
    }

    pub fn fields(&self) -> Option<&FieldSet<T>> {
        self.fields.as_ref()
    }

    pub fn fields_mut(&mut self) -> Option<&mut FieldSet<T>> {
        self.fields.as_mut()
    }

    /// Incremented on every (re)allocation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T: RenderTarget> Default for FieldAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FakeTarget {
        id: usize,
        size: GridSize,
    }

    impl RenderTarget for FakeTarget {
        fn size(&self) -> GridSize {
            self.size
        }
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Create(usize),
        Release(usize),
    }

    #[derive(Default)]
    struct RecordingFactory {
        next_id: usize,
        events: Vec<Event>,
    }

    impl TargetFactory for RecordingFactory {
        type Target = FakeTarget;

        fn create_target(&mut self, desc: &TargetDesc) -> FakeTarget {
            let id = self.next_id;
            self.next_id += 1;
            self.events.push(Event::Create(id));
            FakeTarget { id, size: desc.size }
        }

        fn release_target(&mut self, target: FakeTarget) {
            self.events.push(Event::Release(target.id));
        }
    }

    #[test]
    fn test_grid_size_never_zero() {
        let size = GridSize::new(0, 0);
        assert_eq!(size, GridSize::new(1, 1));
        assert_eq!(GridSize::new(640, 480).scaled(0.0, 4096), GridSize::new(1, 1));
    }

    #[test]
    fn test_grid_size_scaled_and_capped() {
        let surface = GridSize::new(1920, 1080);
        assert_eq!(surface.scaled(0.5, 4096), GridSize::new(960, 540));
        assert_eq!(surface.scaled(4.0, 2048), GridSize::new(2048, 2048));
    }

    #[test]
    fn test_double_buffer_swap_twice_restores() {
        let mut pair = DoubleBuffer::new(1, 2);
        assert_eq!((*pair.read(), *pair.write()), (1, 2));
        pair.swap();
        assert_eq!((*pair.read(), *pair.write()), (2, 1));
        pair.swap();
        assert_eq!((*pair.read(), *pair.write()), (1, 2));
        assert_eq!(pair.read_slot(), Slot::A);
    }

    #[test]
    fn test_split_returns_read_and_write() {
        let mut pair = DoubleBuffer::new(1, 2);
        pair.swap();
        let (read, write) = pair.split();
        assert_eq!(*read, 2);
        *write = 7;
        pair.swap();
        assert_eq!(*pair.read(), 7);
    }

    #[test]
    fn test_field_set_uses_two_resolutions() {
        let mut factory = RecordingFactory::default();
        let set = FieldSet::allocate(&mut factory, GridSize::square(128), GridSize::square(512));
        assert_eq!(factory.next_id, 10);
        assert!(set.is_consistent());
        assert_eq!(set.velocity.size(), Some(GridSize::square(128)));
        assert_eq!(set.dye.size(), Some(GridSize::square(512)));
    }

    #[test]
    fn test_resize_creates_before_releasing() {
        let mut factory = RecordingFactory::default();
        let mut allocator = FieldAllocator::new();
        allocator.allocate(&mut factory, GridSize::square(32), GridSize::square(64));
        factory.events.clear();

        allocator.resize(&mut factory, GridSize::square(16), GridSize::square(48));

        let first_release = factory
            .events
            .iter()
            .position(|e| matches!(e, Event::Release(_)))
            .unwrap();
        let creates = factory.events[..first_release].len();
        assert_eq!(creates, 10, "all new targets exist before any old one is freed");
        assert_eq!(factory.events.len(), 20);
        assert_eq!(allocator.generation(), 2);
        assert!(allocator.fields().unwrap().is_consistent());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut factory = RecordingFactory::default();
        let mut allocator = FieldAllocator::new();
        allocator.allocate(&mut factory, GridSize::square(8), GridSize::square(8));
        allocator.release(&mut factory);
        allocator.release(&mut factory);
        let releases = factory.events.iter().filter(|e| matches!(e, Event::Release(_))).count();
        assert_eq!(releases, 10);
        assert!(allocator.fields().is_none());
    }
}
