// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use ash::vk;
use vklab_render::FrameSlot;

/// Command pool with one primary buffer per frame slot. Buffers are reset
/// individually, so the pool is created with RESET_COMMAND_BUFFER.
pub struct CommandSource {
    device: ash::Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandSource {
    pub(crate) unsafe fn new(device: &ash::Device, queue_family: u32, count: usize) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let pool = device
            .create_command_pool(&pool_info, None)
            .context("create_command_pool")?;
        let mut source = CommandSource {
            device: device.clone(),
            pool,
            buffers: Vec::new(),
        };

        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        source.buffers = device
            .allocate_command_buffers(&alloc_info)
            .context("allocate_command_buffers")?;
        Ok(source)
    }

    pub(crate) fn get(&self, slot: FrameSlot) -> Result<vk::CommandBuffer> {
        self.buffers
            .get(slot.index())
            .copied()
            .ok_or_else(|| anyhow!("no command buffer for {slot}"))
    }
}

// Buffers are freed before their pool.
impl Drop for CommandSource {
    fn drop(&mut self) {
        unsafe {
            if !self.buffers.is_empty() {
                self.device.free_command_buffers(self.pool, &self.buffers);
            }
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
