//! Vulkan command recording.
//!
//! [`VulkanCommandList`] implements [`CommandList`] on a primary command
//! buffer that owns its pool. Draws go through dynamic rendering against
//! the [`RenderTarget`] attached to the shared [`PassBindings`].
//!
//! # Resource binding
//!
//! Pass, object and material constants are not bound through descriptor
//! sets. Their buffer device addresses travel in a push-constant block
//! ([`DrawPushConstants`]) that is pushed right before every draw, together
//! with the texture slot. All pipelines share one pipeline layout carrying
//! that block.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;
use tracing::{info, trace};

use crate::backend::{
    CommandList, DrawIndexed, GeometryBinding, GpuAddress, IndexFormat, PipelineHandle,
    PrimitiveTopology, TextureSlot,
};
use crate::device::Device;
use crate::error::RhiResult;

/// Texture index pushed when no texture is bound.
pub const NO_TEXTURE: u32 = u32::MAX;

/// Stages that read the push-constant block.
pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Push-constant block read by every draw.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 8    | pass |
/// | 8      | 8    | object |
/// | 16     | 8    | material |
/// | 24     | 4    | texture_index |
/// | 28     | 4    | _padding |
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawPushConstants {
    /// Device address of the pass-constant record.
    pub pass: u64,
    /// Device address of the object-constant record.
    pub object: u64,
    /// Device address of the material-constant record.
    pub material: u64,
    /// Texture descriptor index, or [`NO_TEXTURE`].
    pub texture_index: u32,
    pub _padding: u32,
}

impl Default for DrawPushConstants {
    fn default() -> Self {
        Self {
            pass: 0,
            object: 0,
            material: 0,
            texture_index: NO_TEXTURE,
            _padding: 0,
        }
    }
}

impl DrawPushConstants {
    /// Size of the block in bytes.
    pub const SIZE: u32 = size_of::<Self>() as u32;
}

impl PrimitiveTopology {
    /// Converts to the Vulkan topology.
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

impl IndexFormat {
    /// Converts to the Vulkan index type.
    pub fn to_vk(self) -> vk::IndexType {
        match self {
            IndexFormat::U16 => vk::IndexType::UINT16,
            IndexFormat::U32 => vk::IndexType::UINT32,
        }
    }
}

/// Off-screen attachments a pass renders into.
///
/// The owner keeps the images in `COLOR_ATTACHMENT_OPTIMAL` and
/// `DEPTH_ATTACHMENT_OPTIMAL` layout while attached.
#[derive(Clone, Copy, Debug)]
pub struct RenderTarget {
    pub color_view: vk::ImageView,
    pub depth_view: Option<vk::ImageView>,
    pub extent: vk::Extent2D,
}

/// Pipelines and render target shared by all command lists of a backend.
#[derive(Debug, Default)]
pub struct PassBindings {
    pipelines: RwLock<Vec<vk::Pipeline>>,
    target: RwLock<Option<RenderTarget>>,
}

impl PassBindings {
    /// Registers an externally created pipeline and returns its handle.
    pub fn register_pipeline(&self, pipeline: vk::Pipeline) -> PipelineHandle {
        let mut pipelines = self.pipelines.write();
        pipelines.push(pipeline);
        PipelineHandle((pipelines.len() - 1) as u32)
    }

    /// Looks up a registered pipeline.
    pub fn pipeline(&self, handle: PipelineHandle) -> Option<vk::Pipeline> {
        self.pipelines.read().get(handle.0 as usize).copied()
    }

    /// Replaces the render target used by subsequent passes.
    pub fn set_target(&self, target: Option<RenderTarget>) {
        *self.target.write() = target;
    }

    /// Current render target.
    pub fn target(&self) -> Option<RenderTarget> {
        *self.target.read()
    }
}

/// Command list recording into one primary buffer from a private pool.
///
/// `reset` resets the whole pool, so it must only be called once the GPU
/// has finished the previous recording.
pub struct VulkanCommandList {
    device: Arc<Device>,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    layout: vk::PipelineLayout,
    bindings: Arc<PassBindings>,
    push: DrawPushConstants,
    pass_active: bool,
    pipeline_bound: bool,
    recording: bool,
}

impl VulkanCommandList {
    /// Creates a command list with its own pool on the graphics queue family.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation or buffer allocation fails.
    pub fn new(
        device: Arc<Device>,
        layout: vk::PipelineLayout,
        bindings: Arc<PassBindings>,
    ) -> RhiResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.graphics_family())
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.handle().create_command_pool(&pool_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = match unsafe { device.handle().allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.handle().destroy_command_pool(pool, None) };
                return Err(e.into());
            }
        };
        trace!("Command list allocated on family {}", device.graphics_family());

        Ok(Self {
            device,
            pool,
            buffer,
            layout,
            bindings,
            push: DrawPushConstants::default(),
            pass_active: false,
            pipeline_bound: false,
            recording: false,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Returns true between `reset` and `close`.
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    #[inline]
    fn raw(&self) -> &ash::Device {
        self.device.handle()
    }

    fn set_viewport_and_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport::default()
            .width(extent.width as f32)
            .height(extent.height as f32)
            .max_depth(1.0);
        let scissor = vk::Rect2D::default().extent(extent);
        unsafe {
            self.raw().cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.raw().cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        // Frees the buffer along with the pool.
        unsafe { self.raw().destroy_command_pool(self.pool, None) };
        trace!("Command list freed");
    }
}

impl CommandList for VulkanCommandList {
    fn reset(&mut self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.raw()
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
            self.raw().begin_command_buffer(self.buffer, &begin_info)?;
        }
        self.push = DrawPushConstants::default();
        self.pass_active = false;
        self.pipeline_bound = false;
        self.recording = true;
        Ok(())
    }

    fn begin_pass(&mut self, clear_color: [f32; 4]) {
        let Some(target) = self.bindings.target() else {
            trace!("No render target attached, pass skipped");
            return;
        };

        let color = [vk::RenderingAttachmentInfo::default()
            .image_view(target.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            })];
        let depth = target.depth_view.map(|view| {
            vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                })
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D::default().extent(target.extent))
            .layer_count(1)
            .color_attachments(&color);
        if let Some(depth) = depth.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth);
        }

        unsafe { self.raw().cmd_begin_rendering(self.buffer, &rendering_info) };
        self.set_viewport_and_scissor(target.extent);
        self.pass_active = true;
    }

    fn end_pass(&mut self) {
        if self.pass_active {
            unsafe { self.raw().cmd_end_rendering(self.buffer) };
            self.pass_active = false;
            self.pipeline_bound = false;
        }
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        if !self.pass_active {
            return;
        }
        let Some(vk_pipeline) = self.bindings.pipeline(pipeline) else {
            panic!("pipeline {:?} was never registered", pipeline);
        };
        unsafe {
            self.raw()
                .cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipeline)
        };
        self.pipeline_bound = true;
    }

    fn set_pass_constants(&mut self, address: GpuAddress) {
        self.push.pass = address.raw();
    }

    fn set_geometry(&mut self, geometry: &GeometryBinding) {
        let vertices = vk::Buffer::from_raw(geometry.vertex_buffer.0);
        let indices = vk::Buffer::from_raw(geometry.index_buffer.0);
        unsafe {
            self.raw()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[vertices], &[0]);
            self.raw()
                .cmd_bind_index_buffer(self.buffer, indices, 0, geometry.index_format.to_vk());
        }
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        unsafe {
            self.raw()
                .cmd_set_primitive_topology(self.buffer, topology.to_vk())
        };
    }

    fn set_texture(&mut self, slot: TextureSlot) {
        self.push.texture_index = slot.0;
    }

    fn set_object_constants(&mut self, address: GpuAddress) {
        self.push.object = address.raw();
    }

    fn set_material_constants(&mut self, address: GpuAddress) {
        self.push.material = address.raw();
    }

    fn draw_indexed(&mut self, args: DrawIndexed) {
        if !self.pipeline_bound {
            return;
        }
        unsafe {
            self.raw().cmd_push_constants(
                self.buffer,
                self.layout,
                PUSH_CONSTANT_STAGES,
                0,
                bytemuck::bytes_of(&self.push),
            );
            self.raw().cmd_draw_indexed(
                self.buffer,
                args.index_count,
                args.instance_count,
                args.start_index,
                args.base_vertex,
                args.start_instance,
            );
        }
        // Texture binding is per draw.
        self.push.texture_index = NO_TEXTURE;
    }

    fn close(&mut self) -> RhiResult<()> {
        self.end_pass();
        unsafe { self.raw().end_command_buffer(self.buffer)? };
        self.recording = false;
        Ok(())
    }
}

/// Creates the pipeline layout shared by all pipelines drawn by the renderer.
///
/// # Errors
///
/// Returns an error if layout creation fails.
pub fn create_draw_pipeline_layout(device: &Device) -> RhiResult<vk::PipelineLayout> {
    let ranges = [vk::PushConstantRange {
        stage_flags: PUSH_CONSTANT_STAGES,
        offset: 0,
        size: DrawPushConstants::SIZE,
    }];
    let create_info = vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&ranges);
    let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
    info!(
        "Draw pipeline layout created ({} byte push constants)",
        DrawPushConstants::SIZE
    );
    Ok(layout)
}
