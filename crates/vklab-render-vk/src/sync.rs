// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use ash::vk;
use vklab_render::FrameSlot;

#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signalled so the first wait on each slot returns at once.
    pub in_flight: vk::Fence,
}

/// Per-slot semaphores and fence. Sized by frames in flight, not by swapchain
/// image count, so it survives swapchain recreation untouched.
pub struct FrameSyncTable {
    device: ash::Device,
    frames: Vec<FrameSync>,
}

impl FrameSyncTable {
    pub(crate) unsafe fn new(device: &ash::Device, count: usize) -> Result<Self> {
        let mut table = FrameSyncTable {
            device: device.clone(),
            frames: Vec::with_capacity(count),
        };

        let sem_ci = vk::SemaphoreCreateInfo::default();
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        for _ in 0..count {
            let image_available = device
                .create_semaphore(&sem_ci, None)
                .context("create_semaphore(image_available)")?;
            let render_finished = match device.create_semaphore(&sem_ci, None) {
                Ok(s) => s,
                Err(e) => {
                    device.destroy_semaphore(image_available, None);
                    return Err(anyhow!("create_semaphore(render_finished): {e:?}"));
                }
            };
            let in_flight = match device.create_fence(&fence_ci, None) {
                Ok(f) => f,
                Err(e) => {
                    device.destroy_semaphore(image_available, None);
                    device.destroy_semaphore(render_finished, None);
                    return Err(anyhow!("create_fence(in_flight): {e:?}"));
                }
            };
            table.frames.push(FrameSync {
                image_available,
                render_finished,
                in_flight,
            });
        }
        Ok(table)
    }

    pub(crate) fn get(&self, slot: FrameSlot) -> Result<FrameSync> {
        self.frames
            .get(slot.index())
            .copied()
            .ok_or_else(|| anyhow!("{slot} outside sync table of {}", self.frames.len()))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl Drop for FrameSyncTable {
    fn drop(&mut self) {
        // The owner idles the device first. A fence reset for a frame that never
        // got submitted stays unsignalled, so waiting on fences here could hang.
        unsafe {
            for f in &self.frames {
                self.device.destroy_semaphore(f.image_available, None);
                self.device.destroy_semaphore(f.render_finished, None);
                self.device.destroy_fence(f.in_flight, None);
            }
        }
    }
}
