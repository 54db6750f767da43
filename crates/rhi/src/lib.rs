//! Render Hardware Interface.
//!
//! This crate provides the device seam used by the frame-resource renderer.
//! It handles:
//! - The backend traits ([`Backend`], [`GpuTimeline`], [`MappedBuffer`], [`CommandList`])
//! - A Vulkan backend built on `ash` and `gpu-allocator`
//! - A headless backend that simulates an asynchronous GPU on the host

mod error;

pub mod backend;
pub mod buffer;
pub mod command;
pub mod device;
pub mod headless;
pub mod instance;
pub mod physical_device;
pub mod sync;
pub mod vulkan;

pub use backend::{
    Backend, BufferHandle, BufferUsage, CommandList, DrawIndexed, GeometryBinding, GpuAddress,
    GpuTimeline, IndexFormat, MappedBuffer, PipelineHandle, PrimitiveTopology, TextureSlot,
};
pub use error::{RhiError, RhiResult};
pub use headless::{
    Command, Completion, HeadlessBackend, HeadlessBuffer, HeadlessCommandList, SimulatedTimeline,
    Submission,
};
pub use vulkan::VulkanBackend;

// Re-export ash types that users might need
pub use ash::vk;
