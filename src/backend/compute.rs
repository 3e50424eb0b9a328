// Compute round trip
//
// A compute program runs one invocation per cell of a 2D work grid over a
// storage buffer of `width * height` floats:
//
//   set_values(..) ──> dispatch() ──> wait() ──> get_values()
//
// Everything is synchronous. `wait` is the only completion barrier, and
// touching the buffer while a dispatch is in flight is an error rather than
// a race.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use super::buffer::GpuBuffer;
use super::shader::{self, ShaderStage};
use super::VulkanDevice;

/// Size of the compute work grid, one invocation per cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGrid {
    pub width: u32,
    pub height: u32,
}

impl WorkGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of cells (and floats in the value buffer)
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("expected {expected} values for the work grid, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("a dispatch is still in flight; call wait() first")]
    Pending,

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    #[error(transparent)]
    Buffer(#[from] anyhow::Error),
}

/// Where the value buffer is in the round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing submitted since the last write
    Idle,
    /// Submitted, GPU may still be reading or writing the buffer
    InFlight,
    /// Waited on; results are readable
    Complete,
}

impl DispatchState {
    /// Host access to the buffer is only allowed outside a dispatch
    pub fn check_host_access(self) -> Result<(), ComputeError> {
        match self {
            DispatchState::InFlight => Err(ComputeError::Pending),
            DispatchState::Idle | DispatchState::Complete => Ok(()),
        }
    }

    /// State after writing `len` fresh values into a buffer sized for `grid`
    pub fn write(self, grid: WorkGrid, len: usize) -> Result<Self, ComputeError> {
        self.check_host_access()?;
        if len != grid.len() {
            return Err(ComputeError::LengthMismatch {
                expected: grid.len(),
                actual: len,
            });
        }
        Ok(DispatchState::Idle)
    }

    /// State after submitting a dispatch
    pub fn submit(self) -> Result<Self, ComputeError> {
        self.check_host_access()?;
        Ok(DispatchState::InFlight)
    }

    /// True if there is a fence to wait on
    pub fn is_pending(self) -> bool {
        self == DispatchState::InFlight
    }

    /// State after waiting; anything not in flight is left alone
    pub fn complete(self) -> Self {
        match self {
            DispatchState::InFlight => DispatchState::Complete,
            other => other,
        }
    }
}

/// Compute shader plus the buffer it transforms
pub struct ComputeProgram {
    grid: WorkGrid,
    state: DispatchState,
    values: GpuBuffer,
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl ComputeProgram {
    /// Compile the compute shader at `path` and allocate a grid-sized buffer.
    ///
    /// Compile failures come back as a `ShaderError` inside the error chain.
    pub fn new(device: Arc<VulkanDevice>, path: &Path, grid: WorkGrid) -> Result<Self> {
        if grid.is_empty() {
            anyhow::bail!("Compute work grid {}x{} has no cells", grid.width, grid.height);
        }

        let compiled = shader::compile_file(ShaderStage::Compute, path)?;

        let values = GpuBuffer::new(
            device.clone(),
            "compute values",
            vk::BufferUsageFlags::STORAGE_BUFFER,
            (grid.len() * std::mem::size_of::<f32>()) as vk::DeviceSize,
        )?;

        let module = shader::create_shader_module(&device, &compiled)?;

        // Wrap everything in a half-built program so Drop cleans up on error
        let mut program = Self {
            grid,
            state: DispatchState::Idle,
            values,
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set: vk::DescriptorSet::null(),
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
            device,
        };

        let result = program.create_objects(module);
        unsafe { program.device.device.destroy_shader_module(module, None) };
        result?;

        log::info!("Built compute program from {:?} over a {}x{} grid", path, grid.width, grid.height);
        Ok(program)
    }

    fn create_objects(&mut self, module: vk::ShaderModule) -> Result<()> {
        let device = &self.device.device;

        // Descriptor set: binding 0 = the value buffer
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .build()];
        let set_layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        self.set_layout = unsafe { device.create_descriptor_set_layout(&set_layout_info, None) }
            .context("Failed to create compute descriptor set layout")?;

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 1,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        self.descriptor_pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .context("Failed to create compute descriptor pool")?;

        let set_layouts = [self.set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&set_layouts);
        self.descriptor_set = unsafe { device.allocate_descriptor_sets(&alloc_info) }
            .context("Failed to allocate compute descriptor set")?[0];

        let buffer_info = [vk::DescriptorBufferInfo {
            buffer: self.values.handle(),
            offset: 0,
            range: vk::WHOLE_SIZE,
        }];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(self.descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .buffer_info(&buffer_info)
            .build();
        unsafe { device.update_descriptor_sets(&[write], &[]) };

        // Pipeline
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        self.pipeline_layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .context("Failed to create compute pipeline layout")?;

        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(c"main")
            .build();
        let pipeline_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(self.pipeline_layout)
            .build();
        self.pipeline = unsafe {
            device.create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| e)
        .context("Failed to create compute pipeline")?[0];

        // Command buffer + fence for the round trip
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.device.queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        self.command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create compute command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        self.command_buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate compute command buffer")?[0];

        self.fence = unsafe { device.create_fence(&vk::FenceCreateInfo::builder(), None) }
            .context("Failed to create compute fence")?;

        Ok(())
    }

    /// Seed the input buffer; needs exactly `grid.len()` values
    pub fn set_values(&mut self, values: &[f32]) -> Result<(), ComputeError> {
        let next = self.state.write(self.grid, values.len())?;
        self.values.write(values)?;
        self.state = next;
        Ok(())
    }

    /// Submit one dispatch over the whole grid
    pub fn dispatch(&mut self) -> Result<(), ComputeError> {
        let next = self.state.submit()?;

        let device = &self.device.device;
        let cmd = self.command_buffer;

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;

            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, self.pipeline);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            device.cmd_dispatch(cmd, self.grid.width, self.grid.height, 1);

            // Make shader writes visible to the host once the fence signals
            let barrier = vk::BufferMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::SHADER_WRITE)
                .dst_access_mask(vk::AccessFlags::HOST_READ)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(self.values.handle())
                .offset(0)
                .size(vk::WHOLE_SIZE)
                .build();
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );

            device.end_command_buffer(cmd)?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            device.queue_submit(self.device.queue, &[submit_info.build()], self.fence)?;
        }

        self.state = next;
        Ok(())
    }

    /// Block until the last dispatch has finished. No-op if none is pending.
    pub fn wait(&mut self) -> Result<(), ComputeError> {
        if !self.state.is_pending() {
            return Ok(());
        }

        unsafe {
            self.device.device.wait_for_fences(&[self.fence], true, u64::MAX)?;
            self.device.device.reset_fences(&[self.fence])?;
        }

        self.state = self.state.complete();
        Ok(())
    }

    /// Read the whole grid back, row-major
    pub fn get_values(&self) -> Result<Vec<f32>, ComputeError> {
        self.state.check_host_access()?;
        Ok(self.values.read(self.grid.len())?)
    }
}

impl Drop for ComputeProgram {
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            if self.state.is_pending() {
                let _ = device.wait_for_fences(&[self.fence], true, u64::MAX);
            }
            // Null handles are ignored by the destroy calls
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_len_is_width_times_height() {
        assert_eq!(WorkGrid::new(10, 1).len(), 10);
        assert_eq!(WorkGrid::new(4, 3).len(), 12);
        assert!(WorkGrid::new(0, 8).is_empty());
    }

    #[test]
    fn host_access_blocked_only_in_flight() {
        assert!(DispatchState::Idle.check_host_access().is_ok());
        assert!(DispatchState::Complete.check_host_access().is_ok());
        assert!(matches!(
            DispatchState::InFlight.check_host_access(),
            Err(ComputeError::Pending)
        ));
    }

    #[test]
    fn wrong_length_write_is_rejected() {
        let grid = WorkGrid::new(10, 1);
        let state = DispatchState::Complete;

        assert!(matches!(
            state.write(grid, 3),
            Err(ComputeError::LengthMismatch { expected: 10, actual: 3 })
        ));
        // a rejected write leaves the state where it was
        assert_eq!(state, DispatchState::Complete);
        assert_eq!(state.write(grid, 10).unwrap(), DispatchState::Idle);
    }

    #[test]
    fn write_while_in_flight_is_pending() {
        let grid = WorkGrid::new(2, 2);
        assert!(matches!(
            DispatchState::InFlight.write(grid, 4),
            Err(ComputeError::Pending)
        ));
    }

    #[test]
    fn round_trip_transitions() {
        let grid = WorkGrid::new(4, 3);

        let state = DispatchState::Idle.write(grid, 12).unwrap();
        assert_eq!(state, DispatchState::Idle);

        let state = state.submit().unwrap();
        assert_eq!(state, DispatchState::InFlight);
        assert!(state.is_pending());
        assert!(matches!(state.submit(), Err(ComputeError::Pending)));

        let state = state.complete();
        assert_eq!(state, DispatchState::Complete);
        assert!(state.check_host_access().is_ok());

        // dispatching again straight from Complete is allowed
        assert_eq!(state.submit().unwrap(), DispatchState::InFlight);
    }

    #[test]
    fn wait_without_dispatch_is_noop() {
        assert!(!DispatchState::Idle.is_pending());
        assert_eq!(DispatchState::Idle.complete(), DispatchState::Idle);
        assert!(!DispatchState::Complete.is_pending());
        assert_eq!(DispatchState::Complete.complete(), DispatchState::Complete);
    }

    #[test]
    fn error_messages() {
        let err = ComputeError::LengthMismatch { expected: 10, actual: 3 };
        assert_eq!(err.to_string(), "expected 10 values for the work grid, got 3");
        assert!(ComputeError::Pending.to_string().contains("wait()"));
    }
}
