//! Logical device, graphics queue and memory allocator.
//!
//! The device enables exactly the features GPU selection checks for:
//! timeline semaphores, buffer device address and dynamic rendering. All
//! frame work goes to one graphics queue.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use renderer_rhi::instance::Instance;
//! use renderer_rhi::physical_device::select_physical_device;
//! use renderer_rhi::device::Device;
//!
//! let instance = Arc::new(Instance::new(false).expect("Vulkan instance"));
//! let gpu = select_physical_device(instance.handle()).expect("No suitable GPU");
//! let device = Device::new(instance, &gpu).expect("Logical device");
//! println!("uniform alignment {}", device.min_uniform_alignment());
//! ```

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::RhiResult;
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

/// Logical device shared through `Arc` by buffers, timelines and command lists.
pub struct Device {
    device: ash::Device,
    /// Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Queue access must be externally synchronized.
    queue: Mutex<vk::Queue>,
    graphics_family: u32,
    min_uniform_alignment: u64,
    _instance: Arc<Instance>,
}

impl Device {
    /// Creates the logical device on `gpu` and its allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization fails.
    pub fn new(instance: Arc<Instance>, gpu: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let graphics_family = gpu.graphics_family;

        let priorities = [1.0f32];
        let queues = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_family)
            .queue_priorities(&priorities)];

        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true)
            .buffer_device_address(true);
        let mut features_1_3 =
            vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queues)
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);
        let device = unsafe {
            instance
                .handle()
                .create_device(gpu.device, &create_info, None)?
        };
        let queue = unsafe { device.get_device_queue(graphics_family, 0) };
        info!(
            "Logical device created on '{}', graphics family {}",
            gpu.device_name(),
            graphics_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: gpu.device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        debug!("Memory allocator ready");

        Ok(Arc::new(Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue: Mutex::new(queue),
            graphics_family,
            min_uniform_alignment: gpu.min_uniform_alignment(),
            _instance: instance,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Minimum uniform offset alignment in bytes.
    #[inline]
    pub fn min_uniform_alignment(&self) -> u64 {
        self.min_uniform_alignment
    }

    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Blocks until every queue is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails, e.g. on device loss.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue under its lock.
    ///
    /// # Safety
    ///
    /// Every command buffer in `submits` must be fully recorded, and every
    /// resource it references must outlive its execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    pub unsafe fn submit_graphics(&self, submits: &[vk::SubmitInfo], fence: vk::Fence) -> RhiResult<()> {
        let queue = self.queue.lock();
        unsafe { self.device.queue_submit(*queue, submits, fence)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Device idle wait failed during drop: {:?}", e);
            }
            // Memory blocks are freed through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync; the allocator and queue sit behind mutexes.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
