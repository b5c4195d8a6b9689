// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic frame protocol: frame slots, the per-frame state
//! machine and swapchain recreation, expressed over the [`FrameBackend`],
//! [`Overlay`] and [`DrawableSurface`] seams.
mod backend;
mod driver;
mod error;
mod slots;

pub use backend::{
    AcquireOutcome, Acquired, DrawableSurface, FrameBackend, NoOverlay, Overlay, PresentOutcome,
};
pub use driver::{FrameDriver, FrameState, FrameStats, FrameStatus};
pub use error::FrameError;
pub use slots::{FrameSlot, FrameSlots};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        RenderSize { width, height }
    }

    /// A minimised window reports zero in at least one dimension.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
