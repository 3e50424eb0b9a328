// Per-frame recording
//
// Each frame in flight owns a command buffer, its sync objects and its own
// vertex/index buffers. A slot is only touched after its fence has signalled,
// so uploads never overwrite data the GPU is still reading.
//
// `FrameSurface` is the Vulkan side of `batch::RenderSurface`: the batch
// renderer's clear/upload/draw calls turn into commands on the slot's
// command buffer.

use anyhow::Result;
use ash::vk;
use glam::Vec3;
use std::sync::Arc;
use super::buffer::GpuBuffer;
use super::pipeline::Program;
use super::sync::FrameSync;
use super::VulkanDevice;
use crate::batch::RenderSurface;

/// Starting capacity of the per-frame geometry buffers (grows on demand)
const INITIAL_GEOMETRY_BYTES: vk::DeviceSize = 64 * 1024;

/// Resources owned by one frame in flight
pub struct FrameSlot {
    pub sync: FrameSync,
    pub command_buffer: vk::CommandBuffer,
    pub vertices: GpuBuffer,
    pub indices: GpuBuffer,
}

impl FrameSlot {
    pub fn new(device: Arc<VulkanDevice>, command_buffer: vk::CommandBuffer) -> Result<Self> {
        Ok(Self {
            sync: FrameSync::new(device.clone())?,
            command_buffer,
            vertices: GpuBuffer::new(
                device.clone(),
                "batch vertices",
                vk::BufferUsageFlags::VERTEX_BUFFER,
                INITIAL_GEOMETRY_BYTES,
            )?,
            indices: GpuBuffer::new(
                device,
                "batch indices",
                vk::BufferUsageFlags::INDEX_BUFFER,
                INITIAL_GEOMETRY_BYTES,
            )?,
        })
    }
}

/// Records one frame into a slot's command buffer
pub struct FrameSurface<'a> {
    device: &'a VulkanDevice,
    slot: &'a mut FrameSlot,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    /// Used when something draws before the frame was cleared
    fallback_clear: Vec3,
    in_pass: bool,
}

impl<'a> FrameSurface<'a> {
    /// Reset the slot's command buffer and start recording
    pub fn begin(
        device: &'a VulkanDevice,
        slot: &'a mut FrameSlot,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        fallback_clear: Vec3,
    ) -> Result<Self> {
        let cmd = slot.command_buffer;
        unsafe {
            device.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.device.begin_command_buffer(cmd, &begin_info)?;
        }

        Ok(Self {
            device,
            slot,
            render_pass,
            framebuffer,
            extent,
            fallback_clear,
            in_pass: false,
        })
    }

    /// Close the render pass and the command buffer
    pub fn finish(mut self) -> Result<vk::CommandBuffer> {
        // An untouched frame still has to clear and transition the image
        if !self.in_pass {
            self.begin_pass(self.fallback_clear);
        }

        let cmd = self.slot.command_buffer;
        unsafe {
            self.device.device.cmd_end_render_pass(cmd);
            self.device.device.end_command_buffer(cmd)?;
        }
        Ok(cmd)
    }

    fn full_rect(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    fn begin_pass(&mut self, clear: Vec3) {
        let cmd = self.slot.command_buffer;
        let clear_values = [color_clear_value(clear)];

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffer)
            .render_area(self.full_rect())
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.device.device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            self.device.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.device.cmd_set_scissor(cmd, 0, &[self.full_rect()]);
        }
        self.in_pass = true;
    }

    fn ensure_pass(&mut self) {
        if !self.in_pass {
            self.begin_pass(self.fallback_clear);
        }
    }
}

fn color_clear_value(color: Vec3) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue {
            float32: [color.x, color.y, color.z, 1.0],
        },
    }
}

impl RenderSurface for FrameSurface<'_> {
    type Program = Program;

    fn clear(&mut self, color: Vec3) {
        if !self.in_pass {
            // The pass's load op does the clear
            self.begin_pass(color);
            return;
        }

        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: color_clear_value(color),
        };
        let rect = vk::ClearRect {
            rect: self.full_rect(),
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            self.device.device.cmd_clear_attachments(self.slot.command_buffer, &[attachment], &[rect]);
        }
    }

    fn use_program(&mut self, program: &Program) {
        self.ensure_pass();
        program.bind(self.slot.command_buffer);
    }

    fn upload_vertices(&mut self, vertices: &[f32]) -> Result<()> {
        self.slot.vertices.write(vertices)
    }

    fn upload_indices(&mut self, indices: &[u32]) -> Result<()> {
        self.slot.indices.write(indices)
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.ensure_pass();
        let cmd = self.slot.command_buffer;
        unsafe {
            self.device.device.cmd_bind_vertex_buffers(cmd, 0, &[self.slot.vertices.handle()], &[0]);
            self.device.device.cmd_bind_index_buffer(cmd, self.slot.indices.handle(), 0, vk::IndexType::UINT32);
            self.device.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
        }
    }
}
