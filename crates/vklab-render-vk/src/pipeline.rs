// SPDX-License-Identifier: CEPL-1.0
use crate::pass::RenderPass;
use crate::scene::Vertex;
use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use std::ffi::CStr;
use std::io::Cursor;

const VS_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
const FS_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));
const ENTRY: &CStr = c"main";

/// Camera descriptor set layout and the pipeline layout built on it.
/// Neither depends on the swapchain, so they live as long as the renderer.
pub struct PipelineLayouts {
    device: ash::Device,
    pub(crate) camera_set: vk::DescriptorSetLayout,
    pub(crate) layout: vk::PipelineLayout,
}

impl PipelineLayouts {
    pub(crate) unsafe fn new(device: &ash::Device) -> Result<Self> {
        let binding = vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            ..Default::default()
        };
        let set_ci = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: 1,
            p_bindings: &binding,
            ..Default::default()
        };
        let mut layouts = PipelineLayouts {
            device: device.clone(),
            camera_set: vk::DescriptorSetLayout::null(),
            layout: vk::PipelineLayout::null(),
        };
        layouts.camera_set = device
            .create_descriptor_set_layout(&set_ci, None)
            .context("create_descriptor_set_layout")?;

        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &layouts.camera_set,
            ..Default::default()
        };
        layouts.layout = device
            .create_pipeline_layout(&layout_info, None)
            .context("create_pipeline_layout")?;
        Ok(layouts)
    }
}

impl Drop for PipelineLayouts {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device
                .destroy_descriptor_set_layout(self.camera_set, None);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterState {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
}

struct ShaderModule<'a> {
    device: &'a ash::Device,
    handle: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    unsafe fn new(device: &'a ash::Device, spv: &[u8]) -> Result<Self> {
        let code = read_spv(&mut Cursor::new(spv)).context("read_spv")?;
        let ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: code.len() * 4,
            ..Default::default()
        };
        let handle = device
            .create_shader_module(&ci, None)
            .context("create_shader_module")?;
        Ok(ShaderModule { device, handle })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.handle, None) };
    }
}

/// Graphics pipeline for the triangle. Bound to a render pass, so rebuilt with it.
pub struct Pipeline {
    device: ash::Device,
    pub(crate) handle: vk::Pipeline,
}

impl Pipeline {
    pub(crate) unsafe fn new(
        device: &ash::Device,
        layouts: &PipelineLayouts,
        render_pass: &RenderPass,
        raster: RasterState,
    ) -> Result<Self> {
        let vs = ShaderModule::new(device, VS_SPV)?;
        let fs = ShaderModule::new(device, FS_SPV)?;

        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs.handle,
                p_name: ENTRY.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs.handle,
                p_name: ENTRY.as_ptr(),
                ..Default::default()
            },
        ];

        // --- Vertex input: binding 0 = Vertex { pos, color } ---
        let vb = vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let va = [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, pos) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
        ];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &vb,
            vertex_attribute_description_count: va.len() as u32,
            p_vertex_attribute_descriptions: va.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };

        // --- Viewport/scissor are dynamic, so the pipeline survives extent changes ---
        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        let rasterization = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: raster.polygon_mode,
            cull_mode: raster.cull_mode,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &rasterization,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout: layouts.layout,
            render_pass: render_pass.handle,
            subpass: 0,
            ..Default::default()
        };

        let pipelines = device
            .create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
            .map_err(|(_, err)| anyhow!("create_graphics_pipelines failed: {err:?}"))?;
        let handle = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("create_graphics_pipelines returned nothing"))?;

        Ok(Pipeline {
            device: device.clone(),
            handle,
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline(self.handle, None) };
    }
}
