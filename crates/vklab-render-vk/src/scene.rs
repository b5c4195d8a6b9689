// SPDX-License-Identifier: CEPL-1.0
use crate::buffer::HostBuffer;
use crate::context::DeviceContext;
use crate::pipeline::PipelineLayouts;
use anyhow::{anyhow, Context, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use vklab_math::CameraUbo;
use vklab_render::FrameSlot;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

/// Upright triangle in the YZ plane facing the camera start (looking down +X).
pub const TRIANGLE: [Vertex; 3] = [
    // top (red)
    Vertex {
        pos: [0.0, 0.0, 0.6],
        color: [1.0, 0.0, 0.0],
    },
    // right on screen (blue)
    Vertex {
        pos: [0.0, -0.5, -0.4],
        color: [0.0, 0.0, 1.0],
    },
    // left on screen (green)
    Vertex {
        pos: [0.0, 0.5, -0.4],
        color: [0.0, 1.0, 0.0],
    },
];

/// Vertex buffer plus one camera uniform buffer and descriptor set per frame slot.
/// A slot's uniform is only written after that slot's fence has been waited.
pub struct SceneResources {
    device: ash::Device,
    vertices: HostBuffer,
    vertex_count: u32,
    uniforms: Vec<HostBuffer>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl SceneResources {
    pub(crate) unsafe fn new(
        ctx: &DeviceContext,
        layouts: &PipelineLayouts,
        slots: usize,
    ) -> Result<Self> {
        let device = &ctx.device;
        let mem_props = ctx.memory_properties();

        // 1) vertices
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
        let mut vertices = HostBuffer::new(
            device,
            &mem_props,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        vertices.write(bytes)?;

        // 2) per-slot uniforms
        let ubo_size = std::mem::size_of::<CameraUbo>() as vk::DeviceSize;
        let mut uniforms = Vec::with_capacity(slots);
        for _ in 0..slots {
            let mut ubo = HostBuffer::new(
                device,
                &mem_props,
                ubo_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;
            ubo.write(bytemuck::bytes_of(&CameraUbo::IDENTITY))?;
            uniforms.push(ubo);
        }

        // 3) pool
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: slots as u32,
        }];
        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: slots as u32,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = device
            .create_descriptor_pool(&pool_ci, None)
            .context("create_descriptor_pool")?;
        let mut scene = SceneResources {
            device: device.clone(),
            vertices,
            vertex_count: TRIANGLE.len() as u32,
            uniforms,
            pool,
            sets: Vec::new(),
        };

        // 4) sets
        let set_layouts = vec![layouts.camera_set; slots];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: pool,
            descriptor_set_count: slots as u32,
            p_set_layouts: set_layouts.as_ptr(),
            ..Default::default()
        };
        scene.sets = device
            .allocate_descriptor_sets(&alloc)
            .context("allocate_descriptor_sets")?;

        // 5) point each set at its slot's uniform
        let infos: Vec<vk::DescriptorBufferInfo> = scene
            .uniforms
            .iter()
            .map(|u| vk::DescriptorBufferInfo {
                buffer: u.buffer,
                offset: 0,
                range: ubo_size,
            })
            .collect();
        let writes: Vec<vk::WriteDescriptorSet> = scene
            .sets
            .iter()
            .zip(&infos)
            .map(|(&set, info)| vk::WriteDescriptorSet {
                s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                dst_set: set,
                dst_binding: 0,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                p_buffer_info: info,
                ..Default::default()
            })
            .collect();
        device.update_descriptor_sets(&writes, &[]);

        Ok(scene)
    }

    pub(crate) fn write_camera(&mut self, slot: FrameSlot, ubo: &CameraUbo) -> Result<()> {
        self.uniforms
            .get_mut(slot.index())
            .ok_or_else(|| anyhow!("no camera uniform for {slot}"))?
            .write(bytemuck::bytes_of(ubo))
    }

    pub(crate) unsafe fn draw(
        &self,
        cmd: vk::CommandBuffer,
        slot: FrameSlot,
        layout: vk::PipelineLayout,
    ) -> Result<()> {
        let set = *self
            .sets
            .get(slot.index())
            .ok_or_else(|| anyhow!("no descriptor set for {slot}"))?;
        self.device
            .cmd_bind_vertex_buffers(cmd, 0, &[self.vertices.buffer], &[0]);
        self.device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            0,
            &[set],
            &[],
        );
        self.device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
        Ok(())
    }
}

impl Drop for SceneResources {
    fn drop(&mut self) {
        // Sets go with the pool; buffers drop after this.
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_two_packed_vec3() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE).len(), 72);
    }

    #[test]
    fn triangle_faces_the_start_camera() {
        // All on the x = 0 plane, spread over Y and Z.
        assert!(TRIANGLE.iter().all(|v| v.pos[0] == 0.0));
        let top = TRIANGLE.iter().map(|v| v.pos[2]).fold(f32::MIN, f32::max);
        assert!(top > 0.0);
    }
}
