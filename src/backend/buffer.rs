// Buffer utilities for vertex, index and storage buffers
//
// Every buffer here is host-visible: the CPU writes through a persistent
// mapping and the GPU reads it directly. Good enough for per-frame batches
// and the compute round trip, which both rewrite their whole contents.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;
use super::VulkanDevice;

/// Smallest buffer we ever create; keeps zero-length uploads bindable
pub const MIN_CAPACITY: vk::DeviceSize = 256;

/// Upload size in bytes: element count times element size
pub fn byte_size<T>(data: &[T]) -> vk::DeviceSize {
    std::mem::size_of_val(data) as vk::DeviceSize
}

/// Capacity to reallocate to when `required` bytes no longer fit
pub fn grown_capacity(current: vk::DeviceSize, required: vk::DeviceSize) -> vk::DeviceSize {
    if required <= current {
        return current;
    }
    required.next_power_of_two().max(MIN_CAPACITY)
}

/// A host-visible GPU buffer that owns its memory
pub struct GpuBuffer {
    device: Arc<VulkanDevice>,
    name: &'static str,
    usage: vk::BufferUsageFlags,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    capacity: vk::DeviceSize,
}

impl GpuBuffer {
    pub fn new(
        device: Arc<VulkanDevice>,
        name: &'static str,
        usage: vk::BufferUsageFlags,
        capacity: vk::DeviceSize,
    ) -> Result<Self> {
        let capacity = capacity.max(MIN_CAPACITY);
        let (buffer, allocation) = create_buffer(&device, name, usage, capacity)?;

        Ok(Self {
            device,
            name,
            usage,
            buffer,
            allocation: Some(allocation),
            capacity,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Replace the buffer contents with `data`, growing if needed.
    ///
    /// Growing destroys the old buffer, so the caller must know the GPU is
    /// done with it (i.e. the owning frame's fence has signalled).
    pub fn write<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<()> {
        let size = byte_size(data);

        if size > self.capacity {
            let capacity = grown_capacity(self.capacity, size);
            log::debug!("Growing {} buffer: {} -> {} bytes", self.name, self.capacity, capacity);

            let (buffer, allocation) = create_buffer(&self.device, self.name, self.usage, capacity)?;
            self.release();
            self.buffer = buffer;
            self.allocation = Some(allocation);
            self.capacity = capacity;
        }

        let mapped = self
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .with_context(|| format!("{} buffer is not host-mapped", self.name))?;

        mapped[..size as usize].copy_from_slice(bytemuck::cast_slice(data));
        Ok(())
    }

    /// Read back the first `count` elements
    pub fn read<T: bytemuck::Pod>(&self, count: usize) -> Result<Vec<T>> {
        let size = count * std::mem::size_of::<T>();
        if size as vk::DeviceSize > self.capacity {
            anyhow::bail!("Read of {} bytes past end of {} buffer", size, self.name);
        }

        let mapped = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .with_context(|| format!("{} buffer is not host-mapped", self.name))?;

        Ok(bytemuck::cast_slice(&mapped[..size]).to_vec())
    }

    fn release(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator.lock().free(allocation) {
                log::error!("Failed to free {} buffer memory: {}", self.name, e);
            }
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Create a buffer and bind it to fresh host-visible memory
fn create_buffer(
    device: &VulkanDevice,
    name: &str,
    usage: vk::BufferUsageFlags,
    size: vk::DeviceSize,
) -> Result<(vk::Buffer, Allocation)> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe {
        device.device.create_buffer(&buffer_info, None)
            .with_context(|| format!("Failed to create {} buffer", name))?
    };

    let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

    let allocation = device.allocator.lock().allocate(&AllocationCreateDesc {
        name,
        requirements,
        location: MemoryLocation::CpuToGpu,
        linear: true,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    });

    let allocation = match allocation {
        Ok(allocation) => allocation,
        Err(e) => {
            unsafe { device.device.destroy_buffer(buffer, None) };
            return Err(e).with_context(|| format!("Failed to allocate {} buffer memory", name));
        }
    };

    unsafe {
        device.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            .with_context(|| format!("Failed to bind {} buffer memory", name))?;
    }

    Ok((buffer, allocation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_is_count_times_element_size() {
        let vertices = [0.0f32; 20];
        assert_eq!(byte_size(&vertices), 80);

        let indices = [0u32; 6];
        assert_eq!(byte_size(&indices), 24);

        let empty: [f32; 0] = [];
        assert_eq!(byte_size(&empty), 0);
    }

    #[test]
    fn byte_size_does_not_depend_on_pointer_width() {
        // Three quads: 60 floats, 18 indices
        let vertices = vec![1.0f32; 60];
        let indices = vec![1u32; 18];
        assert_eq!(byte_size(&vertices), 240);
        assert_eq!(byte_size(&indices), 72);
    }

    #[test]
    fn capacity_grows_to_power_of_two() {
        assert_eq!(grown_capacity(256, 100), 256);
        assert_eq!(grown_capacity(256, 256), 256);
        assert_eq!(grown_capacity(256, 257), 512);
        assert_eq!(grown_capacity(256, 5000), 8192);
        assert_eq!(grown_capacity(0, 1), MIN_CAPACITY);
    }
}
