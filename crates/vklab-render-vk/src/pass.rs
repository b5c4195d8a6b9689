// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;

/// Single colour attachment, cleared on load, handed to the presentation engine at the end.
pub struct RenderPass {
    device: ash::Device,
    pub(crate) handle: vk::RenderPass,
}

impl RenderPass {
    pub(crate) unsafe fn new(device: &ash::Device, format: vk::Format) -> Result<Self> {
        let color = vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT; the layout
        // transition must not start before it.
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let ci = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        let handle = device
            .create_render_pass(&ci, None)
            .context("create_render_pass")?;
        Ok(RenderPass {
            device: device.clone(),
            handle,
        })
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.device.destroy_render_pass(self.handle, None) };
    }
}

/// One framebuffer per swapchain image view, indexed by image index.
pub struct Framebuffers {
    device: ash::Device,
    handles: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    pub(crate) unsafe fn new(
        device: &ash::Device,
        render_pass: &RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let mut fbs = Framebuffers {
            device: device.clone(),
            handles: Vec::with_capacity(views.len()),
        };
        for view in views {
            let ci = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: render_pass.handle,
                attachment_count: 1,
                p_attachments: view,
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = device
                .create_framebuffer(&ci, None)
                .context("create_framebuffer")?;
            fbs.handles.push(fb);
        }
        Ok(fbs)
    }

    pub(crate) fn get(&self, image: u32) -> Option<vk::Framebuffer> {
        self.handles.get(image as usize).copied()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &fb in &self.handles {
                self.device.destroy_framebuffer(fb, None);
            }
        }
    }
}
