// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync

use ash::vk;
use anyhow::Result;
use std::sync::Arc;
use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // First wait must not block

        unsafe {
            Ok(Self {
                image_available: device.device.create_semaphore(&semaphore_info, None)?,
                render_finished: device.device.create_semaphore(&semaphore_info, None)?,
                in_flight_fence: device.device.create_fence(&fence_info, None)?,
                device,
            })
        }
    }

    /// Block until the GPU is done with this slot
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device.device.wait_for_fences(&[self.in_flight_fence], true, u64::MAX)?;
        }
        Ok(())
    }

    /// Re-arm the fence. Only call once a submit for this slot is certain.
    pub fn reset(&self) -> Result<()> {
        unsafe {
            self.device.device.reset_fences(&[self.in_flight_fence])?;
        }
        Ok(())
    }

    /// Consume `image_available` without rendering anything.
    ///
    /// An empty submit waits on the semaphore and signals the fence, so the
    /// slot is usable again after a frame that failed to record.
    pub fn retire(&self, wait_stages: &[vk::PipelineStageFlags]) -> Result<()> {
        let wait_semaphores = [self.image_available];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(wait_stages);

        self.reset()?;
        unsafe {
            self.device.device.queue_submit(
                self.device.queue,
                &[submit_info.build()],
                self.in_flight_fence,
            )?;
        }
        Ok(())
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.image_available, None);
            self.device.device.destroy_semaphore(self.render_finished, None);
            self.device.device.destroy_fence(self.in_flight_fence, None);
        }
    }
}
