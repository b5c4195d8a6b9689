// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend for the frame driver: one triangle, a free-look camera
//! uniform and a frame-time HUD.
mod buffer;
mod commands;
mod context;
mod debug;
mod hud;
mod pass;
mod pipeline;
mod scene;
mod settings;
mod swapchain;
mod sync;

use anyhow::{anyhow, ensure, Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, warn};
use vklab_math::CameraUbo;
use vklab_render::{AcquireOutcome, Acquired, FrameBackend, FrameSlot, PresentOutcome, RenderSize};

use commands::CommandSource;
use context::DeviceContext;
use pass::{Framebuffers, RenderPass};
use pipeline::{Pipeline, PipelineLayouts, RasterState};
use scene::SceneResources;
use swapchain::Swapchain;
use sync::FrameSyncTable;

pub use context::{pick_queue_families, QueueFamilies};
pub use hud::HudOverlay;
pub use scene::{Vertex, TRIANGLE};
pub use settings::{CullModePref, PresentModePref, RendererSettings};

/// What the overlay needs to know about the current swapchain generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainTarget {
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub present_mode: vk::PresentModeKHR,
    pub image_count: usize,
    pub generation: u64,
}

/// Everything that has to be rebuilt with the swapchain.
/// Field order is drop order.
struct SwapchainTargets {
    framebuffers: Framebuffers,
    pipeline: Pipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
}

impl SwapchainTargets {
    unsafe fn build(
        device: &ash::Device,
        swapchain: Swapchain,
        layouts: &PipelineLayouts,
        raster: RasterState,
    ) -> Result<Self> {
        let render_pass = RenderPass::new(device, swapchain.format.format)?;
        let framebuffers =
            Framebuffers::new(device, &render_pass, &swapchain.views, swapchain.extent)?;
        let pipeline = Pipeline::new(device, layouts, &render_pass, raster)?;
        Ok(SwapchainTargets {
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
        })
    }

    fn describe(&self) -> SwapchainTarget {
        SwapchainTarget {
            render_pass: self.render_pass.handle,
            extent: self.swapchain.extent,
            format: self.swapchain.format.format,
            present_mode: self.swapchain.present_mode,
            image_count: self.swapchain.image_count(),
            generation: self.swapchain.generation,
        }
    }
}

// STRICT TEARDOWN ORDER (field order):
// - swapchain targets: framebuffers, pipeline, render pass, views + swapchain
// - scene buffers and descriptor pool
// - pipeline + descriptor set layouts
// - command buffers, then their pool
// - per-slot semaphores/fences
// - device, debug messenger, surface, instance
pub struct VkRenderer {
    targets: Option<SwapchainTargets>,
    scene: SceneResources,
    layouts: PipelineLayouts,
    commands: CommandSource,
    sync: FrameSyncTable,
    ctx: DeviceContext,

    target: SwapchainTarget,
    settings: RendererSettings,
    raster: RasterState,
    clear: vk::ClearValue,
    camera: CameraUbo,
}

impl VkRenderer {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: RendererSettings,
    ) -> Result<Self> {
        let frames = settings.max_frames_in_flight;
        ensure!(frames > 0, "max_frames_in_flight must be at least 1");

        // Locals drop in reverse on an early return, so a failed step
        // still tears down what was built before it.
        unsafe {
            let ctx = DeviceContext::new(window, display, settings.validation)?;

            let polygon_mode = if settings.wireframe && ctx.fill_mode_non_solid {
                vk::PolygonMode::LINE
            } else {
                if settings.wireframe {
                    warn!("wireframe requested but fillModeNonSolid is unsupported");
                }
                vk::PolygonMode::FILL
            };
            let raster = RasterState {
                polygon_mode,
                cull_mode: settings.cull_mode.as_vk(),
            };

            let sync = FrameSyncTable::new(&ctx.device, frames)?;
            let commands = CommandSource::new(&ctx.device, ctx.families.graphics, frames)?;
            let layouts = PipelineLayouts::new(&ctx.device)?;
            let scene = SceneResources::new(&ctx, &layouts, frames)?;

            let swapchain = Swapchain::new(&ctx, settings.present_mode, size, None)?;
            let targets = SwapchainTargets::build(&ctx.device, swapchain, &layouts, raster)?;
            let target = targets.describe();

            info!(
                frames_in_flight = frames,
                images = target.image_count,
                "renderer ready"
            );

            Ok(VkRenderer {
                targets: Some(targets),
                scene,
                layouts,
                commands,
                sync,
                ctx,
                target,
                clear: clear_value(settings.clear_color),
                settings,
                raster,
                camera: CameraUbo::IDENTITY,
            })
        }
    }

    pub fn device(&self) -> &ash::Device {
        &self.ctx.device
    }

    pub fn device_name(&self) -> &str {
        self.ctx.device_name()
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn extent(&self) -> RenderSize {
        RenderSize::new(self.target.extent.width, self.target.extent.height)
    }

    /// Camera for the next recorded frame. Copied into the slot's uniform
    /// buffer once that slot's fence has been waited.
    pub fn set_camera(&mut self, camera: CameraUbo) {
        self.camera = camera;
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.settings.clear_color = rgba;
        self.clear = clear_value(rgba);
    }

    fn targets(&self) -> Result<&SwapchainTargets> {
        self.targets
            .as_ref()
            .ok_or_else(|| anyhow!("swapchain targets missing after a failed rebuild"))
    }
}

fn clear_value(rgba: [f32; 4]) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: rgba },
    }
}

impl FrameBackend for VkRenderer {
    type Commands = vk::CommandBuffer;
    type Target = SwapchainTarget;

    fn frames_in_flight(&self) -> usize {
        self.sync.len()
    }

    fn wait_for_slot(&mut self, slot: FrameSlot) -> Result<()> {
        let sync = self.sync.get(slot)?;
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[sync.in_flight], true, u64::MAX)
                .context("wait_for_fences")
        }
    }

    fn reset_slot(&mut self, slot: FrameSlot) -> Result<()> {
        let sync = self.sync.get(slot)?;
        unsafe {
            self.ctx
                .device
                .reset_fences(&[sync.in_flight])
                .context("reset_fences")
        }
    }

    fn acquire_image(&mut self, slot: FrameSlot) -> Result<AcquireOutcome> {
        let sync = self.sync.get(slot)?;
        let swapchain = self.targets()?.swapchain.handle;
        let res = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };
        match res {
            Ok((image, suboptimal)) => Ok(AcquireOutcome::Ready(Acquired { image, suboptimal })),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(anyhow!("acquire_next_image: {e:?}")),
        }
    }

    fn begin_frame_commands(&mut self, slot: FrameSlot, image: u32) -> Result<vk::CommandBuffer> {
        let cmd = self.commands.get(slot)?;
        self.scene.write_camera(slot, &self.camera)?;

        let targets = self.targets()?;
        let framebuffer = targets.framebuffers.get(image).ok_or_else(|| {
            anyhow!(
                "image {image} outside swapchain of {}",
                targets.swapchain.image_count()
            )
        })?;
        let d = &self.ctx.device;

        unsafe {
            d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("reset_command_buffer")?;
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            d.begin_command_buffer(cmd, &bi)
                .context("begin_command_buffer")?;

            let rp_begin = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: targets.render_pass.handle,
                framebuffer,
                render_area: vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: targets.swapchain.extent,
                },
                clear_value_count: 1,
                p_clear_values: &self.clear,
                ..Default::default()
            };
            d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
        }
        Ok(cmd)
    }

    fn draw_scene(&mut self, cmd: vk::CommandBuffer, slot: FrameSlot) -> Result<()> {
        let targets = self.targets()?;
        let extent = targets.swapchain.extent;
        let d = &self.ctx.device;
        unsafe {
            d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, targets.pipeline.handle);
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            d.cmd_set_viewport(cmd, 0, &[viewport]);
            d.cmd_set_scissor(cmd, 0, &[scissor]);
            self.scene.draw(cmd, slot, self.layouts.layout)
        }
    }

    fn end_frame_commands(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        let d = &self.ctx.device;
        unsafe {
            d.cmd_end_render_pass(cmd);
            d.end_command_buffer(cmd).context("end_command_buffer")
        }
    }

    fn submit(&mut self, slot: FrameSlot, cmd: vk::CommandBuffer) -> Result<()> {
        let sync = self.sync.get(slot)?;
        let wait_stage = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let si = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &sync.image_available,
            p_wait_dst_stage_mask: wait_stage.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &sync.render_finished,
            ..Default::default()
        };
        unsafe {
            self.ctx
                .device
                .queue_submit(
                    self.ctx.graphics_queue,
                    std::slice::from_ref(&si),
                    sync.in_flight,
                )
                .context("queue_submit")
        }
    }

    fn present(&mut self, slot: FrameSlot, image: u32) -> Result<PresentOutcome> {
        let sync = self.sync.get(slot)?;
        let swapchain = self.targets()?.swapchain.handle;
        let pi = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &sync.render_finished,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image,
            ..Default::default()
        };
        let res = unsafe {
            self.ctx
                .swapchain_loader
                .queue_present(self.ctx.present_queue, &pi)
        };
        match res {
            Ok(false) => Ok(PresentOutcome::Optimal),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(anyhow!("queue_present: {e:?}")),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle().context("device_wait_idle") }
    }

    fn rebuild_swapchain(&mut self, size: RenderSize) -> Result<()> {
        let SwapchainTargets {
            framebuffers,
            pipeline,
            render_pass,
            swapchain: old_swapchain,
        } = self
            .targets
            .take()
            .ok_or_else(|| anyhow!("no swapchain to rebuild"))?;

        // STRICT ORDER:
        // 1) framebuffers, pipeline, render pass of the old generation
        // 2) new swapchain, with the old one as the creation hint
        // 3) old swapchain (and its views)
        // 4) render pass, framebuffers, pipeline for the new generation
        drop(framebuffers);
        drop(pipeline);
        drop(render_pass);

        unsafe {
            let swapchain =
                Swapchain::new(&self.ctx, self.settings.present_mode, size, Some(&old_swapchain))?;
            drop(old_swapchain);

            let targets =
                SwapchainTargets::build(&self.ctx.device, swapchain, &self.layouts, self.raster)?;
            self.target = targets.describe();
            self.targets = Some(targets);
        }
        Ok(())
    }

    fn target(&self) -> &SwapchainTarget {
        &self.target
    }

    fn generation(&self) -> u64 {
        self.target.generation
    }
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        // Fields are destroyed after this returns; nothing may be in flight.
        unsafe {
            if let Err(e) = self.ctx.device.device_wait_idle() {
                warn!("device_wait_idle during teardown: {e:?}");
            }
        }
    }
}
