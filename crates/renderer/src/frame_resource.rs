//! Frame resources and the frame-resource ring.
//!
//! The CPU prepares frame `n + 1` while the GPU still executes frame `n`, so
//! everything the CPU writes per frame is kept in N copies, one per
//! [`FrameResource`]. The ring hands them out cyclically.
//!
//! # Synchronization
//!
//! Each frame resource remembers the fence value signalled by the last
//! submission that used it. Before a frame resource is reused, the CPU
//! waits until the GPU completion counter reaches that value:
//!
//! ```text
//! 1. advance()            select slot (n + 1) mod N
//! 2. wait_until_ready()   block while completed < slot.fence (fence != 0)
//! 3. write constants, record the slot's command list
//! 4. submit, signalling ++fence_counter
//! 5. slot.fence = fence_counter
//! ```
//!
//! At most N frames are therefore in flight at once.

use renderer_core::{MAX_FRAMES_IN_FLIGHT, MIN_FRAMES_IN_FLIGHT};
use renderer_resources::{MaterialConstants, ObjectConstants, PassConstants, Vertex};
use renderer_rhi::{Backend, BufferHandle, GpuAddress, GpuTimeline, RhiResult};
use tracing::{debug, info, trace};

use crate::upload_buffer::UploadBuffer;

/// Record counts every frame resource is sized for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameResourceCounts {
    pub objects: usize,
    pub materials: usize,
    /// Vertices rewritten every frame; 0 for none.
    pub dynamic_vertices: usize,
}

/// Read-only view of the regions a command list binds while recording.
pub struct FrameBindings<'a, Buf> {
    pub pass_constants: GpuAddress,
    pub object_constants: &'a UploadBuffer<Buf, ObjectConstants>,
    pub material_constants: &'a UploadBuffer<Buf, MaterialConstants>,
    /// Vertex region for meshes that draw from per-frame vertices.
    pub frame_vertices: Option<BufferHandle>,
}

/// Everything the CPU writes for one frame in flight.
pub struct FrameResource<B: Backend> {
    index: usize,
    commands: B::CommandList,
    pass_constants: UploadBuffer<B::Buffer, PassConstants>,
    object_constants: UploadBuffer<B::Buffer, ObjectConstants>,
    material_constants: UploadBuffer<B::Buffer, MaterialConstants>,
    dynamic_vertices: Option<UploadBuffer<B::Buffer, Vertex>>,
    /// Fence value of the last submission that used this resource; 0 if unused.
    fence: u64,
}

impl<B: Backend> FrameResource<B> {
    /// Creates the regions and command list of one frame resource.
    ///
    /// # Errors
    ///
    /// Returns an error if any allocation fails.
    pub fn new(backend: &B, index: usize, counts: FrameResourceCounts) -> RhiResult<Self> {
        let pass_constants =
            UploadBuffer::constants(backend, 1, &format!("frame{index}/pass"))?;
        let object_constants =
            UploadBuffer::constants(backend, counts.objects, &format!("frame{index}/objects"))?;
        let material_constants = UploadBuffer::constants(
            backend,
            counts.materials,
            &format!("frame{index}/materials"),
        )?;
        let dynamic_vertices = match counts.dynamic_vertices {
            0 => None,
            n => Some(UploadBuffer::packed(
                backend,
                n,
                &format!("frame{index}/vertices"),
            )?),
        };
        let commands = backend.create_command_list()?;

        debug!("Created frame resource {}", index);

        Ok(Self {
            index,
            commands,
            pass_constants,
            object_constants,
            material_constants,
            dynamic_vertices,
            fence: 0,
        })
    }

    /// Position of this resource in the ring.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fence value of the last submission that used this resource.
    #[inline]
    pub fn fence(&self) -> u64 {
        self.fence
    }

    /// Records the fence value signalled by the submission just made.
    #[inline]
    pub fn set_fence(&mut self, value: u64) {
        self.fence = value;
    }

    /// Blocks until the GPU has finished the last submission that used this
    /// resource. A resource that was never submitted (fence 0) never waits.
    ///
    /// There is no timeout; an unresponsive GPU blocks forever.
    ///
    /// # Returns
    ///
    /// Returns `true` if the call had to block.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion counter cannot be read or the wait
    /// fails.
    pub fn wait_until_ready<T: GpuTimeline + ?Sized>(&self, timeline: &T) -> RhiResult<bool> {
        if self.fence == 0 {
            return Ok(false);
        }
        let completed = timeline.completed_value()?;
        if completed >= self.fence {
            return Ok(false);
        }

        trace!(
            "Frame resource {} waiting for fence {} (completed {})",
            self.index, self.fence, completed
        );
        timeline.wait_for_value(self.fence)?;
        Ok(true)
    }

    #[inline]
    pub fn pass_constants(&self) -> &UploadBuffer<B::Buffer, PassConstants> {
        &self.pass_constants
    }

    #[inline]
    pub fn pass_constants_mut(&mut self) -> &mut UploadBuffer<B::Buffer, PassConstants> {
        &mut self.pass_constants
    }

    #[inline]
    pub fn object_constants(&self) -> &UploadBuffer<B::Buffer, ObjectConstants> {
        &self.object_constants
    }

    #[inline]
    pub fn object_constants_mut(&mut self) -> &mut UploadBuffer<B::Buffer, ObjectConstants> {
        &mut self.object_constants
    }

    #[inline]
    pub fn material_constants(&self) -> &UploadBuffer<B::Buffer, MaterialConstants> {
        &self.material_constants
    }

    #[inline]
    pub fn material_constants_mut(&mut self) -> &mut UploadBuffer<B::Buffer, MaterialConstants> {
        &mut self.material_constants
    }

    #[inline]
    pub fn dynamic_vertices(&self) -> Option<&UploadBuffer<B::Buffer, Vertex>> {
        self.dynamic_vertices.as_ref()
    }

    #[inline]
    pub fn dynamic_vertices_mut(&mut self) -> Option<&mut UploadBuffer<B::Buffer, Vertex>> {
        self.dynamic_vertices.as_mut()
    }

    #[inline]
    pub fn commands(&self) -> &B::CommandList {
        &self.commands
    }

    #[inline]
    pub fn commands_mut(&mut self) -> &mut B::CommandList {
        &mut self.commands
    }

    /// Splits the resource into its command list and the regions it binds.
    pub fn recording(&mut self) -> (&mut B::CommandList, FrameBindings<'_, B::Buffer>) {
        let bindings = FrameBindings {
            pass_constants: self.pass_constants.record_address(0),
            object_constants: &self.object_constants,
            material_constants: &self.material_constants,
            frame_vertices: self.dynamic_vertices.as_ref().map(|region| region.handle()),
        };
        (&mut self.commands, bindings)
    }
}

/// Fixed ring of N frame resources.
pub struct FrameResourceRing<B: Backend> {
    frames: Vec<FrameResource<B>>,
    current: usize,
}

impl<B: Backend> FrameResourceRing<B> {
    /// Creates `frames_in_flight` frame resources. The first
    /// [`advance`](Self::advance) selects resource 0.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is outside
    /// `MIN_FRAMES_IN_FLIGHT..=MAX_FRAMES_IN_FLIGHT`.
    /// [`FrameScheduler::new`](crate::scheduler::FrameScheduler::new)
    /// reports that as an error before getting here.
    ///
    /// # Errors
    ///
    /// Returns an error if any frame resource cannot be created.
    pub fn new(backend: &B, frames_in_flight: usize, counts: FrameResourceCounts) -> RhiResult<Self> {
        assert!(
            (MIN_FRAMES_IN_FLIGHT..=MAX_FRAMES_IN_FLIGHT).contains(&frames_in_flight),
            "frames in flight must be in {}..={}, got {}",
            MIN_FRAMES_IN_FLIGHT,
            MAX_FRAMES_IN_FLIGHT,
            frames_in_flight
        );

        let frames = (0..frames_in_flight)
            .map(|index| FrameResource::new(backend, index, counts))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame resource ring created: {} frames, {} objects, {} materials",
            frames_in_flight, counts.objects, counts.materials
        );

        Ok(Self {
            frames,
            current: frames_in_flight - 1,
        })
    }

    /// Number of frame resources (N).
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; a ring holds at least two resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Selects the next frame resource cyclically and returns it.
    pub fn advance(&mut self) -> &mut FrameResource<B> {
        self.current = (self.current + 1) % self.frames.len();
        &mut self.frames[self.current]
    }

    /// Index of the current frame resource.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &FrameResource<B> {
        &self.frames[self.current]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut FrameResource<B> {
        &mut self.frames[self.current]
    }

    /// Frame resource at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[inline]
    pub fn frame(&self, index: usize) -> &FrameResource<B> {
        &self.frames[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameResource<B>> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use renderer_rhi::{BufferUsage, CommandList, Completion, HeadlessBackend, MappedBuffer};

    const COUNTS: FrameResourceCounts = FrameResourceCounts {
        objects: 4,
        materials: 2,
        dynamic_vertices: 0,
    };

    #[test]
    fn test_advance_cycles() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut ring = FrameResourceRing::new(&backend, 3, COUNTS).unwrap();

        let order: Vec<usize> = (0..7).map(|_| ring.advance().index()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.current_index(), 0);
    }

    #[test]
    fn test_frame_resources_have_distinct_regions() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let ring = FrameResourceRing::new(&backend, 2, COUNTS).unwrap();

        let a = ring.frame(0).object_constants().base_address();
        let b = ring.frame(1).object_constants().base_address();
        assert_ne!(a, b);
        assert_eq!(ring.frame(0).object_constants().capacity(), 4);
        assert_eq!(ring.frame(0).material_constants().capacity(), 2);
        assert!(ring.frame(0).dynamic_vertices().is_none());
    }

    #[test]
    fn test_dynamic_vertex_region() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let counts = FrameResourceCounts {
            dynamic_vertices: 100,
            ..COUNTS
        };
        let mut ring = FrameResourceRing::new(&backend, 3, counts).unwrap();

        let frame = ring.advance();
        let region = frame.dynamic_vertices().unwrap();
        assert_eq!(region.buffer().size(), 100 * 32);
        assert_eq!(region.buffer().usage(), BufferUsage::Vertex);
        let handle = region.handle();

        let (_, bindings) = frame.recording();
        assert_eq!(bindings.frame_vertices, Some(handle));
    }

    #[test]
    fn test_fresh_resource_never_waits() {
        let backend = HeadlessBackend::new(Completion::Manual).unwrap();
        let mut ring = FrameResourceRing::new(&backend, 3, COUNTS).unwrap();

        let frame = ring.advance();
        assert_eq!(frame.fence(), 0);
        assert!(!frame.wait_until_ready(backend.timeline()).unwrap());
    }

    #[test]
    fn test_completed_fence_does_not_wait() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut ring = FrameResourceRing::new(&backend, 2, COUNTS).unwrap();
        let frame = ring.advance();

        let commands = frame.commands_mut();
        commands.reset().unwrap();
        commands.close().unwrap();
        backend.submit(frame.commands_mut(), 1).unwrap();
        frame.set_fence(1);

        assert!(!frame.wait_until_ready(backend.timeline()).unwrap());
    }

    #[test]
    fn test_wait_blocks_until_fence_reached() {
        let backend = HeadlessBackend::new(Completion::Manual).unwrap();
        let mut ring = FrameResourceRing::new(&backend, 2, COUNTS).unwrap();
        let frame = ring.advance();

        let commands = frame.commands_mut();
        commands.reset().unwrap();
        commands.close().unwrap();
        backend.submit(frame.commands_mut(), 1).unwrap();
        frame.set_fence(1);

        let timeline = backend.timeline_handle();
        let completed = Arc::new(AtomicBool::new(false));
        let gpu = {
            let completed = Arc::clone(&completed);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                completed.store(true, Ordering::SeqCst);
                timeline.complete_all();
            })
        };

        assert!(frame.wait_until_ready(backend.timeline()).unwrap());
        assert!(completed.load(Ordering::SeqCst));
        assert!(backend.timeline().completed_value().unwrap() >= 1);
        gpu.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "frames in flight")]
    fn test_ring_depth_is_validated() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let _ = FrameResourceRing::new(&backend, 1, COUNTS);
    }
}
