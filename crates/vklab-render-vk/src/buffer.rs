// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use ash::vk;

/// First memory type allowed by `type_bits` that has all of `req`.
pub fn find_memory_type(
    mem: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    req: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..mem.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0 && mem.memory_types[i as usize].property_flags.contains(req)
    })
}

/// Buffer in HOST_VISIBLE | HOST_COHERENT memory, mapped for its whole lifetime.
pub struct HostBuffer {
    device: ash::Device,
    pub(crate) buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: *mut u8,
}

impl HostBuffer {
    pub(crate) unsafe fn new(
        device: &ash::Device,
        mem_props: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let mut hb = HostBuffer {
            device: device.clone(),
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            size,
            mapped: std::ptr::null_mut(),
        };
        hb.buffer = device.create_buffer(&bci, None).context("create_buffer")?;

        let req = device.get_buffer_memory_requirements(hb.buffer);
        let mem_type = find_memory_type(
            mem_props,
            req.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .ok_or_else(|| anyhow!("no host-visible coherent memory type for {usage:?}"))?;
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: mem_type,
            ..Default::default()
        };
        hb.memory = device.allocate_memory(&mai, None).context("allocate_memory")?;
        device
            .bind_buffer_memory(hb.buffer, hb.memory, 0)
            .context("bind_buffer_memory")?;
        hb.mapped = device
            .map_memory(hb.memory, 0, size, vk::MemoryMapFlags::empty())
            .context("map_memory")? as *mut u8;
        Ok(hb)
    }

    /// Copies `bytes` to the start of the buffer. The GPU must not be reading it.
    pub(crate) fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(anyhow!(
                "write of {} bytes into {}-byte buffer",
                bytes.len(),
                self.size
            ));
        }
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped, bytes.len()) };
        Ok(())
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        unsafe {
            // Freeing the memory unmaps it.
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
