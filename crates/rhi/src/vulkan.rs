//! Vulkan implementation of [`Backend`].
//!
//! # Overview
//!
//! [`VulkanBackend`] renders off-screen on one graphics queue:
//! - The frame fence is a [`TimelineSemaphore`]; every submission signals
//!   the value it is given
//! - Upload buffers are persistently mapped `CpuToGpu` allocations read by
//!   shaders through their buffer device address
//! - Each command list owns a command pool
//! - Pipelines and the render target are created by the caller and handed
//!   over with [`VulkanBackend::register_pipeline`] and
//!   [`VulkanBackend::attach_render_target`]; they must be compatible with
//!   [`VulkanBackend::pipeline_layout`]
//!
//! There is no swapchain, so [`Backend::present`] has nothing to do.
//!
//! # Example
//!
//! ```no_run
//! use renderer_rhi::{Backend, GpuTimeline, VulkanBackend};
//!
//! let backend = VulkanBackend::new(false).expect("Vulkan backend");
//! assert_eq!(backend.timeline().completed_value().unwrap(), 0);
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{info, trace};

use crate::backend::{Backend, BufferUsage, PipelineHandle};
use crate::buffer::Buffer;
use crate::command::{PassBindings, RenderTarget, VulkanCommandList, create_draw_pipeline_layout};
use crate::device::Device;
use crate::error::RhiResult;
use crate::instance::Instance;
use crate::physical_device::select_physical_device;
use crate::sync::TimelineSemaphore;

/// Off-screen Vulkan device with a timeline-semaphore fence.
pub struct VulkanBackend {
    timeline: TimelineSemaphore,
    bindings: Arc<PassBindings>,
    layout: vk::PipelineLayout,
    device: Arc<Device>,
}

impl VulkanBackend {
    /// Creates the instance, picks a GPU and creates the device.
    ///
    /// # Errors
    ///
    /// Returns an error if Vulkan cannot be loaded, no GPU qualifies, or any
    /// object creation fails.
    pub fn new(enable_validation: bool) -> RhiResult<Self> {
        let instance = Arc::new(Instance::new(enable_validation)?);
        let physical_device_info = select_physical_device(instance.handle())?;
        let device = Device::new(instance, &physical_device_info)?;

        let timeline = TimelineSemaphore::new(device.clone())?;
        let layout = create_draw_pipeline_layout(&device)?;

        info!(
            "Vulkan backend ready (min uniform alignment {} bytes)",
            device.min_uniform_alignment()
        );

        Ok(Self {
            timeline,
            bindings: Arc::new(PassBindings::default()),
            layout,
            device,
        })
    }

    /// Returns the logical device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Pipeline layout every registered pipeline must be created with.
    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Registers an externally created graphics pipeline.
    pub fn register_pipeline(&self, pipeline: vk::Pipeline) -> PipelineHandle {
        self.bindings.register_pipeline(pipeline)
    }

    /// Sets the target subsequent passes render into. `None` disables the pass.
    pub fn attach_render_target(&self, target: Option<RenderTarget>) {
        self.bindings.set_target(target);
    }
}

impl Backend for VulkanBackend {
    type Buffer = Buffer;
    type CommandList = VulkanCommandList;
    type Timeline = TimelineSemaphore;

    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn create_upload_buffer(
        &self,
        usage: BufferUsage,
        size: u64,
        label: &str,
    ) -> RhiResult<Buffer> {
        Buffer::new(self.device.clone(), usage, size, label)
    }

    fn create_static_buffer(
        &self,
        usage: BufferUsage,
        data: &[u8],
        label: &str,
    ) -> RhiResult<Buffer> {
        Buffer::new_with_data(self.device.clone(), usage, data, label)
    }

    fn create_command_list(&self) -> RhiResult<VulkanCommandList> {
        VulkanCommandList::new(self.device.clone(), self.layout, self.bindings.clone())
    }

    #[inline]
    fn timeline(&self) -> &TimelineSemaphore {
        &self.timeline
    }

    #[inline]
    fn min_constant_alignment(&self) -> u64 {
        self.device.min_uniform_alignment()
    }

    fn submit(&self, commands: &mut VulkanCommandList, signal_value: u64) -> RhiResult<()> {
        assert!(
            !commands.is_recording(),
            "command list must be closed before submission"
        );

        let command_buffers = [commands.handle()];
        let signal_semaphores = [self.timeline.handle()];
        let signal_values = [signal_value];

        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit_info), vk::Fence::null())?;
        }

        trace!("Submitted frame, signal {}", signal_value);
        Ok(())
    }

    fn present(&self) -> RhiResult<()> {
        Ok(())
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::error!("Failed to wait for device idle: {:?}", e);
        }
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        info!("Vulkan backend destroyed");
    }
}
