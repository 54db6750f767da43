//! Typed upload regions.
//!
//! An [`UploadBuffer`] is a fixed-capacity array of plain-data records in a
//! persistently mapped, host-visible buffer. Records are written in place
//! by index and read by the GPU at `base + index * stride`.
//!
//! Constant regions pad every record to [`CONSTANT_RECORD_ALIGNMENT`] (or
//! the device's larger minimum) so each record can be bound on its own.
//! Vertex regions pack records tightly.

use std::marker::PhantomData;

use bytemuck::Pod;
use renderer_rhi::{Backend, BufferHandle, BufferUsage, GpuAddress, MappedBuffer, RhiResult};
use tracing::debug;

/// Minimum stride of constant records.
pub const CONSTANT_RECORD_ALIGNMENT: u64 = 256;

/// Rounds `value` up to a multiple of `alignment`, which must be a power of two.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Stride of a constant record of `record_size` bytes.
#[inline]
pub fn constant_record_stride(record_size: usize, min_alignment: u64) -> u64 {
    align_up(
        record_size as u64,
        min_alignment.max(CONSTANT_RECORD_ALIGNMENT),
    )
}

/// Fixed-capacity array of `T` records in mapped memory.
pub struct UploadBuffer<Buf, T> {
    buffer: Buf,
    capacity: usize,
    stride: u64,
    _record: PhantomData<T>,
}

impl<Buf: MappedBuffer, T: Pod> UploadBuffer<Buf, T> {
    /// Creates a region of `capacity` constant records.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot be allocated.
    pub fn constants<B>(backend: &B, capacity: usize, label: &str) -> RhiResult<Self>
    where
        B: Backend<Buffer = Buf>,
    {
        let stride = constant_record_stride(size_of::<T>(), backend.min_constant_alignment());
        Self::with_stride(backend, BufferUsage::Uniform, capacity, stride, label)
    }

    /// Creates a region of `capacity` tightly packed records, bindable as
    /// a vertex buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer cannot be allocated.
    pub fn packed<B>(backend: &B, capacity: usize, label: &str) -> RhiResult<Self>
    where
        B: Backend<Buffer = Buf>,
    {
        Self::with_stride(backend, BufferUsage::Vertex, capacity, size_of::<T>() as u64, label)
    }

    fn with_stride<B>(
        backend: &B,
        usage: BufferUsage,
        capacity: usize,
        stride: u64,
        label: &str,
    ) -> RhiResult<Self>
    where
        B: Backend<Buffer = Buf>,
    {
        // Zero-sized buffers are not allocatable; an empty region keeps one
        // record of backing storage.
        let size = stride * capacity.max(1) as u64;
        let buffer = backend.create_upload_buffer(usage, size, label)?;

        debug!(
            "Upload region '{}': {} x {} bytes (stride {})",
            label,
            capacity,
            size_of::<T>(),
            stride
        );

        Ok(Self {
            buffer,
            capacity,
            stride,
            _record: PhantomData,
        })
    }

    /// Overwrites record `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    pub fn copy_record(&mut self, index: usize, record: &T) {
        assert!(
            index < self.capacity,
            "record index {} out of range for upload region of {} records",
            index,
            self.capacity
        );
        self.buffer
            .write(index as u64 * self.stride, bytemuck::bytes_of(record));
    }

    /// GPU address of record `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    #[inline]
    pub fn record_address(&self, index: usize) -> GpuAddress {
        assert!(
            index < self.capacity,
            "record index {} out of range for upload region of {} records",
            index,
            self.capacity
        );
        self.buffer.gpu_address().offset_records(index, self.stride)
    }

    /// GPU address of the first record.
    #[inline]
    pub fn base_address(&self) -> GpuAddress {
        self.buffer.gpu_address()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Distance between consecutive records in bytes.
    #[inline]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle()
    }

    /// The underlying buffer.
    #[inline]
    pub fn buffer(&self) -> &Buf {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_resources::{MaterialConstants, ObjectConstants, PassConstants, Vertex};
    use renderer_rhi::{Completion, HeadlessBackend};
    use glam::Mat4;

    fn backend() -> HeadlessBackend {
        HeadlessBackend::new(Completion::Immediate).unwrap()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_constant_record_stride() {
        assert_eq!(constant_record_stride(ObjectConstants::size(), 64), 256);
        assert_eq!(constant_record_stride(MaterialConstants::size(), 256), 256);
        assert_eq!(constant_record_stride(PassConstants::size(), 256), 1280);
        assert_eq!(constant_record_stride(ObjectConstants::size(), 1024), 1024);
    }

    #[test]
    fn test_record_address() {
        let backend = backend();
        let region: UploadBuffer<_, ObjectConstants> =
            UploadBuffer::constants(&backend, 4, "objects").unwrap();
        let base = region.base_address().raw();

        assert_eq!(region.record_address(0).raw(), base);
        assert_eq!(region.record_address(3).raw(), base + 3 * 256);
        assert_eq!(region.buffer().size(), 4 * 256);
    }

    #[test]
    fn test_copy_record_writes_only_its_slot() {
        let backend = backend();
        let mut region: UploadBuffer<_, ObjectConstants> =
            UploadBuffer::constants(&backend, 3, "objects").unwrap();

        let record = ObjectConstants::new(Mat4::from_scale(glam::Vec3::splat(2.0)), Mat4::IDENTITY);
        region.copy_record(1, &record);

        let contents = region.buffer().contents();
        assert!(contents[..256].iter().all(|b| *b == 0));
        assert_eq!(region.buffer().read::<ObjectConstants>(256), record);
        assert!(contents[512..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_packed_region() {
        let backend = backend();
        let region: UploadBuffer<_, Vertex> = UploadBuffer::packed(&backend, 10, "vertices").unwrap();
        assert_eq!(region.stride(), 32);
        assert_eq!(region.buffer().size(), 320);
    }

    #[test]
    fn test_region_usage() {
        let backend = backend();
        let vertices: UploadBuffer<_, Vertex> = UploadBuffer::packed(&backend, 4, "vertices").unwrap();
        let objects: UploadBuffer<_, ObjectConstants> =
            UploadBuffer::constants(&backend, 4, "objects").unwrap();
        assert_eq!(vertices.buffer().usage(), BufferUsage::Vertex);
        assert_eq!(objects.buffer().usage(), BufferUsage::Uniform);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_copy_record_out_of_range_panics() {
        let backend = backend();
        let mut region: UploadBuffer<_, ObjectConstants> =
            UploadBuffer::constants(&backend, 2, "objects").unwrap();
        region.copy_record(2, &ObjectConstants::default());
    }
}
