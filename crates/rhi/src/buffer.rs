//! Host-visible Vulkan buffers.
//!
//! Vertex, index and constant-record buffers all live in `CpuToGpu` memory
//! from gpu-allocator. Each stays mapped for its whole lifetime and exposes
//! its buffer device address, which is how shaders reach constant records.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use renderer_rhi::BufferUsage;
//! use renderer_rhi::buffer::Buffer;
//! use renderer_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), renderer_rhi::RhiError> {
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let vertex_buffer = Buffer::new_with_data(
//!     device,
//!     BufferUsage::Vertex,
//!     bytemuck::cast_slice(&vertices),
//!     "triangle",
//! )?;
//! # Ok(())
//! # }
//! ```

use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::backend::{BufferHandle, BufferUsage, GpuAddress, MappedBuffer};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

impl BufferUsage {
    /// Vulkan usage flags; every buffer is shader addressable.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        let usage = match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        };
        usage | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
    }

    /// All buffers are written from the host.
    pub fn memory_location(self) -> MemoryLocation {
        MemoryLocation::CpuToGpu
    }
}

/// Persistently mapped buffer. Writes go through `&mut self`.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    /// Taken on drop.
    allocation: Option<Allocation>,
    mapped: NonNull<u8>,
    address: vk::DeviceAddress,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a zero-filled buffer of `size` bytes; `label` names the
    /// allocation in allocator reports.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer or memory allocation fails, or if the
    /// memory cannot be mapped.
    pub fn new(
        device: Arc<Device>,
        usage: BufferUsage,
        size: vk::DeviceSize,
        label: &str,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::BufferError(format!(
                "buffer '{label}' must be larger than 0 bytes"
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().lock().allocate(&AllocationCreateDesc {
            name: label,
            requirements,
            location: usage.memory_location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        // From here on Drop releases both the allocation and the buffer.
        let mapped = allocation.mapped_ptr().map(|ptr| ptr.cast::<u8>());
        let mut this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            mapped: NonNull::dangling(),
            address: 0,
            size,
            usage,
        };

        this.mapped = mapped.ok_or_else(|| {
            RhiError::BufferError(format!("buffer '{label}' memory is not host mapped"))
        })?;

        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_buffer_memory(
                    this.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let address_info = vk::BufferDeviceAddressInfo::default().buffer(this.buffer);
        this.address = unsafe { this.device.handle().get_buffer_device_address(&address_info) };

        // Fresh allocations may hold stale data.
        unsafe { std::ptr::write_bytes(this.mapped.as_ptr(), 0, size as usize) };

        debug!(
            "Created {} buffer '{}': {} bytes at {:#x}",
            usage.name(),
            label,
            size,
            this.address
        );

        Ok(this)
    }

    /// Creates a buffer holding exactly `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is empty or creation fails.
    pub fn new_with_data(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[u8],
        label: &str,
    ) -> RhiResult<Self> {
        let mut buffer = Self::new(device, usage, data.len() as vk::DeviceSize, label)?;
        buffer.write(0, data);
        Ok(buffer)
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Vulkan usage flags the buffer was created with.
    #[inline]
    pub fn vk_usage(&self) -> vk::BufferUsageFlags {
        self.usage.to_vk_usage()
    }
}

impl MappedBuffer for Buffer {
    #[inline]
    fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    fn gpu_address(&self) -> GpuAddress {
        GpuAddress(self.address)
    }

    #[inline]
    fn handle(&self) -> BufferHandle {
        BufferHandle(self.buffer.as_raw())
    }

    fn write(&mut self, offset: u64, data: &[u8]) {
        let end = offset + data.len() as u64;
        assert!(
            end <= self.size,
            "write of {} bytes at {} exceeds {} buffer of {} bytes",
            data.len(),
            offset,
            self.usage.name(),
            self.size
        );

        // The memory is host coherent; no flush is needed.
        unsafe {
            let dst = self.mapped.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.device.allocator().lock().free(allocation)
        {
            tracing::error!("Freeing {} buffer memory failed: {:?}", self.usage.name(), e);
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

// Safety: the mapped pointer is only dereferenced through `&mut self`.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
    }

    #[test]
    fn test_every_usage_is_device_addressable() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index, BufferUsage::Uniform] {
            assert!(
                usage
                    .to_vk_usage()
                    .contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
            );
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
    }

    #[test]
    fn test_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Buffer>();
    }
}
