// SPDX-License-Identifier: CEPL-1.0
use crate::{FrameSlot, RenderSize};
use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acquired {
    pub image: u32,
    /// Image is usable but the swapchain no longer matches the surface.
    pub suboptimal: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready(Acquired),
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// GPU side of the frame protocol. The driver decides *when* each call
/// happens; implementations only perform them. Any `Err` is fatal.
///
/// Every call after `wait_for_slot` may assume the slot's previous
/// submission has completed. `rebuild_swapchain` is only called after
/// `wait_idle` returned.
pub trait FrameBackend {
    /// Handle commands are recorded into.
    type Commands: Copy;
    /// What consumers of the swapchain (the overlay) need to re-read after
    /// every recreation: render pass, extent, format.
    type Target;

    fn frames_in_flight(&self) -> usize;

    /// Block until the slot's in-flight fence is signalled. No timeout.
    fn wait_for_slot(&mut self, slot: FrameSlot) -> Result<()>;
    fn reset_slot(&mut self, slot: FrameSlot) -> Result<()>;

    /// Signals the slot's image-available semaphore on success.
    fn acquire_image(&mut self, slot: FrameSlot) -> Result<AcquireOutcome>;

    /// Reset the slot's command buffer, begin recording and begin the render
    /// pass on the framebuffer of `image`.
    fn begin_frame_commands(&mut self, slot: FrameSlot, image: u32) -> Result<Self::Commands>;
    fn draw_scene(&mut self, cmd: Self::Commands, slot: FrameSlot) -> Result<()>;
    /// End the render pass and the command buffer.
    fn end_frame_commands(&mut self, cmd: Self::Commands) -> Result<()>;

    /// Wait image-available at colour-attachment output, signal
    /// render-finished and the slot's fence.
    fn submit(&mut self, slot: FrameSlot, cmd: Self::Commands) -> Result<()>;
    /// Wait render-finished on the present queue.
    fn present(&mut self, slot: FrameSlot, image: u32) -> Result<PresentOutcome>;

    fn wait_idle(&mut self) -> Result<()>;
    /// Replace the swapchain generation and everything built on it.
    fn rebuild_swapchain(&mut self, size: RenderSize) -> Result<()>;

    fn target(&self) -> &Self::Target;
    /// Bumped by every successful `rebuild_swapchain`.
    fn generation(&self) -> u64;
}

/// Immediate-mode layer drawn inside the scene's render pass.
pub trait Overlay<B: FrameBackend + ?Sized> {
    fn begin_frame(&mut self);
    fn end_frame(&mut self, backend: &B, cmd: B::Commands) -> Result<()>;
    /// Called once at start-up and after every swapchain recreation.
    fn retarget(&mut self, _target: &B::Target) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOverlay;

impl<B: FrameBackend + ?Sized> Overlay<B> for NoOverlay {
    fn begin_frame(&mut self) {}

    fn end_frame(&mut self, _backend: &B, _cmd: B::Commands) -> Result<()> {
        Ok(())
    }
}

/// Window-system side consumed by the driver.
pub trait DrawableSurface {
    /// Current size in pixels; zero while minimised.
    fn drawable_size(&self) -> RenderSize;
    /// Block until at least one window event was processed.
    fn wait_events(&mut self);
    fn should_close(&self) -> bool;
    /// Returns and clears the "framebuffer resized" flag.
    fn take_resize_request(&mut self) -> bool;
}
