// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// For the quad batch that means: interleaved vec2 position + vec3 color,
// triangle list, no culling, no depth, opaque color output.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use std::sync::Arc;
use super::shader::{self, ShaderError, ShaderStage};
use super::VulkanDevice;
use crate::batch::FLOATS_PER_VERTEX;

/// Attribute location of the vec2 position
pub const POSITION_LOCATION: u32 = 0;
/// Attribute location of the vec3 color
pub const COLOR_LOCATION: u32 = 1;

const FLOAT_SIZE: u32 = std::mem::size_of::<f32>() as u32;
/// Bytes between consecutive vertices
pub const VERTEX_STRIDE: u32 = FLOATS_PER_VERTEX as u32 * FLOAT_SIZE;
/// Color follows the two position floats
pub const COLOR_OFFSET: u32 = 2 * FLOAT_SIZE;

/// Render pass with a single cleared color attachment
pub struct RenderPass {
    pub handle: vk::RenderPass,
    pub format: vk::Format,
    device: Arc<VulkanDevice>,
}

impl RenderPass {
    pub fn new(device: Arc<VulkanDevice>, format: vk::Format) -> Result<Self> {
        // Color attachment (the swapchain image)
        let color_attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = &[color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments)
            .build();

        // Wait for the presentation engine to release the image
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();

        let attachments = &[color_attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        let handle = unsafe {
            device.device.create_render_pass(&render_pass_info, None)
                .context("Failed to create render pass")?
        };

        Ok(Self { handle, format, device })
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_render_pass(self.handle, None);
        }
    }
}

/// Create framebuffers for each swapchain image view
pub fn create_framebuffers(
    device: &VulkanDevice,
    image_views: &[vk::ImageView],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    image_views.iter().map(|&image_view| {
        let attachments = &[image_view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe {
            device.device.create_framebuffer(&framebuffer_info, None)
                .context("Failed to create framebuffer")
        }
    }).collect()
}

/// Vertex input description for batch vertices (position + color)
pub fn get_vertex_input_info() -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    // One binding for interleaved position + color data
    let binding = vk::VertexInputBindingDescription::builder()
        .binding(0)
        .stride(VERTEX_STRIDE)
        .input_rate(vk::VertexInputRate::VERTEX)
        .build();

    let position_attr = vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(POSITION_LOCATION)
        .format(vk::Format::R32G32_SFLOAT)
        .offset(0)
        .build();

    let color_attr = vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(COLOR_LOCATION)
        .format(vk::Format::R32G32B32_SFLOAT)
        .offset(COLOR_OFFSET)
        .build();

    (vec![binding], vec![position_attr, color_attr])
}

/// A linked vertex + fragment program: the handle batches are drawn with
pub struct Program {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    device: Arc<VulkanDevice>,
}

impl Program {
    /// Compile both stages, check their interface and build the pipeline
    pub fn from_files(
        device: Arc<VulkanDevice>,
        render_pass: &RenderPass,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<Self, ShaderError> {
        let vertex = shader::compile_file(ShaderStage::Vertex, vertex_path)?;
        let fragment = shader::compile_file(ShaderStage::Fragment, fragment_path)?;
        shader::check_interface(&vertex, &fragment, &[POSITION_LOCATION, COLOR_LOCATION])?;

        let vert_module = shader::create_shader_module(&device, &vertex)?;
        let frag_module = match shader::create_shader_module(&device, &fragment) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.device.destroy_shader_module(vert_module, None) };
                return Err(e);
            }
        };

        let result = create_graphics_pipeline(&device, render_pass.handle, vert_module, frag_module);

        // Modules are baked into the pipeline and not needed anymore
        unsafe {
            device.device.destroy_shader_module(vert_module, None);
            device.device.destroy_shader_module(frag_module, None);
        }

        let (pipeline, layout) = result?;
        log::info!("Built program from {:?} + {:?}", vertex_path, fragment_path);

        Ok(Self { pipeline, layout, device })
    }

    /// Activate the program on a command buffer
    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device.device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Create the graphics pipeline for batched quads
fn create_graphics_pipeline(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
    vert_shader: vk::ShaderModule,
    frag_shader: vk::ShaderModule,
) -> Result<(vk::Pipeline, vk::PipelineLayout), ShaderError> {
    let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(vert_shader)
        .name(c"main")
        .build();

    let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::FRAGMENT)
        .module(frag_shader)
        .name(c"main")
        .build();

    let shader_stages = &[vert_stage, frag_stage];

    let (bindings, attributes) = get_vertex_input_info();
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport and scissor are set per frame, so resizes keep this pipeline
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
        .dynamic_states(&dynamic_states);

    // The two triangles of a quad wind in opposite directions
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build();

    let color_blend_attachments = &[color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(color_blend_attachments);

    let layout_info = vk::PipelineLayoutCreateInfo::builder();
    let pipeline_layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }?;

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(pipeline_layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipelines = unsafe {
        device.device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    };

    match pipelines {
        Ok(pipelines) => Ok((pipelines[0], pipeline_layout)),
        Err((_, e)) => {
            unsafe { device.device.destroy_pipeline_layout(pipeline_layout, None) };
            Err(ShaderError::Link {
                log: format!("graphics pipeline creation failed: {}", e),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_batch_encoding() {
        assert_eq!(VERTEX_STRIDE, 20);
        assert_eq!(COLOR_OFFSET, 8);

        let (bindings, attributes) = get_vertex_input_info();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 20);
        assert_eq!(bindings[0].input_rate, vk::VertexInputRate::VERTEX);

        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[0].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[1].offset, 8);
    }
}
