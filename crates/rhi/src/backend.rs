//! Backend-neutral device interface.
//!
//! The frame-resource renderer talks to the GPU only through the traits in
//! this module:
//!
//! - [`GpuTimeline`] is the fence: a monotonically increasing completion
//!   counter plus a blocking wait.
//! - [`MappedBuffer`] is persistently mapped, host-visible memory with a
//!   GPU virtual address.
//! - [`CommandList`] records the draw protocol for one frame.
//! - [`Backend`] creates the above and owns the single ordered queue.
//!
//! Two implementations exist: [`crate::vulkan::VulkanBackend`] and
//! [`crate::headless::HeadlessBackend`].

use crate::error::RhiResult;

/// GPU virtual address of a byte in a [`MappedBuffer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpuAddress(pub u64);

impl GpuAddress {
    /// Address of record `index` in an array of records spaced `stride` bytes apart.
    #[inline]
    pub fn offset_records(self, index: usize, stride: u64) -> Self {
        Self(self.0 + index as u64 * stride)
    }

    /// Raw address value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque backend buffer handle used for vertex and index binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Opaque pipeline handle. Pipelines are created outside the renderer and
/// registered with the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u32);

/// Index of a texture descriptor in the shader-visible table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureSlot(pub u32);

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Constant records read through their GPU address
    Uniform,
}

impl BufferUsage {
    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
        }
    }
}

/// Width of the indices in an index buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexFormat {
    #[default]
    U16,
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    #[inline]
    pub fn size(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Primitive assembly topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Vertex and index buffer views for one mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryBinding {
    pub vertex_buffer: BufferHandle,
    pub vertex_stride: u32,
    pub index_buffer: BufferHandle,
    pub index_format: IndexFormat,
}

/// Arguments of an indexed draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    pub start_instance: u32,
}

/// The fence: a completion counter advanced by the GPU in submission order.
pub trait GpuTimeline {
    /// Highest value whose work has completed.
    fn completed_value(&self) -> RhiResult<u64>;

    /// Blocks the calling thread until `completed_value() >= value`.
    ///
    /// There is no timeout. Waiting for a value that will never be signalled
    /// blocks forever.
    fn wait_for_value(&self, value: u64) -> RhiResult<()>;
}

/// Persistently mapped, host-visible GPU memory.
///
/// Writes are visible to the GPU without further calls. The host never reads
/// the memory back.
pub trait MappedBuffer {
    /// Size in bytes.
    fn size(&self) -> u64;

    /// GPU virtual address of byte 0.
    fn gpu_address(&self) -> GpuAddress;

    /// Handle used when binding the buffer as vertex or index input.
    fn handle(&self) -> BufferHandle;

    /// Copies `data` to `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + data.len()` exceeds [`MappedBuffer::size`].
    fn write(&mut self, offset: u64, data: &[u8]);
}

/// A command list recording one frame of draws.
///
/// A list is reset only after the GPU has finished the work last submitted
/// from it.
pub trait CommandList {
    /// Discards previous contents and starts recording.
    fn reset(&mut self) -> RhiResult<()>;

    /// Opens the render pass, clearing the target to `clear_color`.
    fn begin_pass(&mut self, clear_color: [f32; 4]);

    /// Closes the render pass.
    fn end_pass(&mut self);

    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    fn set_pass_constants(&mut self, address: GpuAddress);

    fn set_geometry(&mut self, geometry: &GeometryBinding);

    fn set_topology(&mut self, topology: PrimitiveTopology);

    fn set_texture(&mut self, slot: TextureSlot);

    fn set_object_constants(&mut self, address: GpuAddress);

    fn set_material_constants(&mut self, address: GpuAddress);

    fn draw_indexed(&mut self, args: DrawIndexed);

    /// Finishes recording. The list may then be submitted.
    fn close(&mut self) -> RhiResult<()>;
}

/// A GPU device with one ordered submission queue.
pub trait Backend {
    type Buffer: MappedBuffer;
    type CommandList: CommandList;
    type Timeline: GpuTimeline;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Creates a zero-filled upload buffer of `size` bytes, rewritten from
    /// the host while the GPU reads it as `usage`.
    fn create_upload_buffer(
        &self,
        usage: BufferUsage,
        size: u64,
        label: &str,
    ) -> RhiResult<Self::Buffer>;

    /// Creates a buffer holding `data`.
    fn create_static_buffer(
        &self,
        usage: BufferUsage,
        data: &[u8],
        label: &str,
    ) -> RhiResult<Self::Buffer>;

    /// Creates an empty command list.
    fn create_command_list(&self) -> RhiResult<Self::CommandList>;

    /// The queue's completion counter.
    fn timeline(&self) -> &Self::Timeline;

    /// Minimum spacing between constant records read through GPU addresses.
    fn min_constant_alignment(&self) -> u64;

    /// Enqueues `commands` followed by a signal of `signal_value` on the
    /// timeline. Values must be strictly increasing across calls.
    fn submit(&self, commands: &mut Self::CommandList, signal_value: u64) -> RhiResult<()>;

    /// Presents the frame just submitted.
    fn present(&self) -> RhiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_records() {
        let base = GpuAddress(0x1000);
        assert_eq!(base.offset_records(0, 256), base);
        assert_eq!(base.offset_records(3, 256), GpuAddress(0x1000 + 768));
    }

    #[test]
    fn test_index_format_size() {
        assert_eq!(IndexFormat::U16.size(), 2);
        assert_eq!(IndexFormat::U32.size(), 4);
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
    }
}
