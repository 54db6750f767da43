//! Synchronization primitives for Vulkan.
//!
//! The frame fence is a single timeline semaphore. Each queue submission
//! signals the next value of a monotonically increasing counter; the host
//! reads the counter to learn how far the GPU has progressed and blocks on
//! it when it needs a particular submission to finish.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use renderer_rhi::GpuTimeline;
//! use renderer_rhi::device::Device;
//! use renderer_rhi::sync::TimelineSemaphore;
//!
//! # fn example(device: Arc<Device>) -> Result<(), renderer_rhi::RhiError> {
//! let timeline = TimelineSemaphore::new(device)?;
//! assert_eq!(timeline.completed_value()?, 0);
//!
//! // ... submit work that signals value 1 ...
//!
//! timeline.wait_for_value(1)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace};

use crate::backend::GpuTimeline;
use crate::device::Device;
use crate::error::RhiResult;

/// Timeline semaphore used as the frame fence. Any thread may read or
/// wait on it.
pub struct TimelineSemaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Creates a timeline semaphore with an initial value of 0.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        debug!("Frame timeline created");

        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl GpuTimeline for TimelineSemaphore {
    fn completed_value(&self) -> RhiResult<u64> {
        let value = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        };
        Ok(value)
    }

    fn wait_for_value(&self, value: u64) -> RhiResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        trace!("Waiting for timeline value {}", value);
        unsafe { self.device.handle().wait_semaphores(&wait_info, u64::MAX)? };
        Ok(())
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Frame timeline destroyed");
    }
}
