// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics
// Every GPU object is owned by one wrapper and released in its Drop

pub mod buffer;
pub mod compute;
pub mod device;
pub mod frame;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use compute::{ComputeProgram, WorkGrid};
pub use device::VulkanDevice;
pub use frame::{FrameSlot, FrameSurface};
pub use pipeline::{Program, RenderPass};
pub use swapchain::Swapchain;
