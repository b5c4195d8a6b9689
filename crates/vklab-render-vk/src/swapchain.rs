// SPDX-License-Identifier: CEPL-1.0
use crate::context::DeviceContext;
use crate::settings::PresentModePref;
use anyhow::{anyhow, Context, Result};
use ash::khr::swapchain;
use ash::vk;
use vklab_render::RenderSize;

/// Swapchain images and their views. Views are destroyed before the swapchain.
pub struct Swapchain {
    loader: swapchain::Device,
    device: ash::Device,
    pub(crate) handle: vk::SwapchainKHR,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) views: Vec<vk::ImageView>,
    pub(crate) format: vk::SurfaceFormatKHR,
    pub(crate) extent: vk::Extent2D,
    pub(crate) present_mode: vk::PresentModeKHR,
    pub(crate) generation: u64,
}

impl Swapchain {
    /// Builds a swapchain for `size`. When `old` is given it is passed as the
    /// recreation hint; the caller still owns it and drops it afterwards.
    pub(crate) unsafe fn new(
        ctx: &DeviceContext,
        pref: PresentModePref,
        size: RenderSize,
        old: Option<&Swapchain>,
    ) -> Result<Self> {
        let (caps, formats, modes) = ctx.surface_support()?;

        let format = choose_surface_format(&formats)
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let present_mode = choose_present_mode(&modes, pref);
        let extent = extent_from_caps(&caps, size);
        let min_image_count = image_count(&caps);

        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        // Separate graphics/present families need CONCURRENT sharing.
        let family_indices = ctx.families.unique();
        let (sharing_mode, index_count, p_indices) = if ctx.families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
        } else {
            (
                vk::SharingMode::CONCURRENT,
                family_indices.len() as u32,
                family_indices.as_ptr(),
            )
        };

        let (old_swapchain, generation) = match old {
            Some(o) => (o.handle, o.generation + 1),
            None => (vk::SwapchainKHR::null(), 0),
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.surface.handle,
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: index_count,
            p_queue_family_indices: p_indices,
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain,
            ..Default::default()
        };

        let handle = ctx
            .swapchain_loader
            .create_swapchain(&swap_info, None)
            .context("create_swapchain")?;

        // From here on a failed step is cleaned up by Drop.
        let mut sc = Swapchain {
            loader: ctx.swapchain_loader.clone(),
            device: ctx.device.clone(),
            handle,
            images: Vec::new(),
            views: Vec::new(),
            format,
            extent,
            present_mode,
            generation,
        };
        sc.images = sc
            .loader
            .get_swapchain_images(handle)
            .context("get_swapchain_images")?;
        sc.views.reserve(sc.images.len());
        for &image in &sc.images {
            let iv_info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: format.format,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = sc
                .device
                .create_image_view(&iv_info, None)
                .context("create_image_view")?;
            sc.views.push(view);
        }

        tracing::info!(
            generation,
            format = ?format.format,
            color_space = ?format.color_space,
            present_mode = ?present_mode,
            extent = %format_args!("{}x{}", extent.width, extent.height),
            images = sc.images.len(),
            "swapchain created"
        );
        Ok(sc)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

/// B8G8R8A8_SRGB with sRGB non-linear, then any *_SRGB format, then whatever the driver lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let srgb_nonlinear = |f: &&vk::SurfaceFormatKHR| {
        f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    };
    formats
        .iter()
        .filter(srgb_nonlinear)
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB)
        .or_else(|| {
            formats
                .iter()
                .filter(srgb_nonlinear)
                .find(|f| f.format == vk::Format::R8G8B8A8_SRGB)
        })
        .or_else(|| formats.first())
        .copied()
}

/// The requested mode when the surface offers it, otherwise FIFO (always available).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], pref: PresentModePref) -> vk::PresentModeKHR {
    let want = pref.as_vk();
    if modes.contains(&want) {
        want
    } else {
        tracing::warn!(?want, "present mode unavailable, falling back to FIFO");
        vk::PresentModeKHR::FIFO
    }
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}
