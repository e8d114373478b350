//! Resize debouncing and the per-frame request signal.

use std::time::{Duration, Instant};

use crate::field::GridSize;

/// What the host should do after a frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRequest {
    /// Schedule another callback on the next display refresh.
    Continue,
    /// The engine is not running; do not schedule.
    Idle,
}

/// Holds the latest pending surface size until the window has been quiet
/// for the debounce period.
///
/// A new event replaces the pending size and resets the deadline rather than
/// queueing a second resize.
#[derive(Debug)]
pub struct ResizeDebounce {
    quiet: Duration,
    pending: Option<(GridSize, Instant)>,
}

impl ResizeDebounce {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, pending: None }
    }

    /// Record a resize event at `now`.
    pub fn request(&mut self, size: GridSize, now: Instant) {
        self.pending = Some((size, now + self.quiet));
    }

    /// The pending size, if its quiet window has elapsed. Clears it.
    pub fn take_due(&mut self, now: Instant) -> Option<GridSize> {
        match self.pending {
            Some((size, deadline)) if now >= deadline => {
                self.pending = None;
                Some(size)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
