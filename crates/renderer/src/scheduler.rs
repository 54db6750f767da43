//! Frame scheduler.
//!
//! The scheduler drives one frame at a time through a fixed sequence of
//! stages:
//!
//! ```text
//! AdvanceSlot -> WaitIfBusy -> UpdateConstants -> RecordCommands
//!             -> Submit -> Present -> StampFence
//! ```
//!
//! [`begin_frame`](FrameScheduler::begin_frame) covers the first two,
//! [`update_constants`](FrameScheduler::update_constants) and
//! [`record`](FrameScheduler::record) one each, and
//! [`submit_and_present`](FrameScheduler::submit_and_present) the last
//! three. Calling them out of order is a programming error and panics.
//!
//! The only blocking point is the fence wait in `begin_frame`. The CPU can
//! therefore run up to N - 1 frames ahead of the GPU.
//!
//! # Example
//!
//! ```
//! use renderer_renderer::draw::LayerPipelines;
//! use renderer_renderer::scheduler::FrameScheduler;
//! use renderer_renderer::scene::{RenderItemDesc, SceneBuilder};
//! use renderer_resources::{MaterialDesc, MeshGeometry, PassConstants, SubmeshGeometry};
//! use renderer_rhi::{Backend, BufferUsage, Completion, HeadlessBackend, IndexFormat};
//!
//! let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
//! let vb = backend.create_static_buffer(BufferUsage::Vertex, &[0; 96], "vb").unwrap();
//! let ib = backend.create_static_buffer(BufferUsage::Index, &[0; 6], "ib").unwrap();
//! let mut mesh = MeshGeometry::new("tri", vb, 32, ib, IndexFormat::U16);
//! mesh.add_submesh("tri", SubmeshGeometry::whole(3));
//!
//! let mut builder = SceneBuilder::new(3);
//! let mesh = builder.add_mesh(mesh).unwrap();
//! let material = builder.add_material(MaterialDesc::new("plain")).unwrap();
//! builder.add_render_item(RenderItemDesc::new(mesh, "tri", material)).unwrap();
//! let mut scene = builder.build().unwrap();
//!
//! let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();
//! for _ in 0..5 {
//!     scheduler.begin_frame().unwrap();
//!     scheduler.update_constants(&mut scene, &PassConstants::default(), None);
//!     scheduler.record(&scene, &LayerPipelines::new(), [0.0; 4]).unwrap();
//!     scheduler.submit_and_present().unwrap();
//! }
//! scheduler.flush().unwrap();
//! assert_eq!(scheduler.fence_value(), 5);
//! ```

use renderer_core::{MAX_FRAMES_IN_FLIGHT, MIN_FRAMES_IN_FLIGHT};
use renderer_resources::PassConstants;
use renderer_rhi::{Backend, CommandList, GpuTimeline, MappedBuffer, RhiResult};
use tracing::{debug, info, trace};

use crate::draw::{LayerPipelines, record_main_pass};
use crate::dynamic::{DynamicGeometry, upload_vertices};
use crate::error::{RenderError, RenderResult};
use crate::frame_resource::{FrameResource, FrameResourceCounts, FrameResourceRing};
use crate::propagate::{update_material_constants, update_object_constants};
use crate::scene::Scene;

/// Stage of the frame currently being prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStage {
    AdvanceSlot,
    WaitIfBusy,
    UpdateConstants,
    RecordCommands,
    Submit,
    Present,
    StampFence,
}

/// What happened during one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames completed before this one.
    pub frame_number: u64,
    /// Frame resource used.
    pub slot: usize,
    /// Fence value signalled by this frame's submission.
    pub fence_value: u64,
    /// Whether the CPU blocked on the GPU before reusing the slot.
    pub waited: bool,
    pub objects_uploaded: usize,
    pub materials_uploaded: usize,
    pub draw_calls: u32,
}

/// Drives the frame-resource ring through the per-frame stages.
pub struct FrameScheduler<B: Backend> {
    // Declared first so the frame resources drop before the backend.
    ring: FrameResourceRing<B>,
    backend: B,
    /// Last fence value handed to a submission.
    fence_counter: u64,
    stage: Option<FrameStage>,
    frames_completed: u64,
    stats: FrameStats,
}

impl<B: Backend> FrameScheduler<B> {
    /// Creates a scheduler whose frame resources are sized for `scene`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The device backend; owned by the scheduler
    /// * `scene` - Sizes the object and material regions
    /// * `frames_in_flight` - Ring depth N
    /// * `dynamic_vertices` - Size of the per-frame vertex region; 0 for none
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::FramesInFlight`] if `frames_in_flight` is out
    /// of range, [`RenderError::FrameCountMismatch`] if `scene` was built for
    /// a different N, or a device error if a frame resource cannot be
    /// allocated.
    pub fn new(
        backend: B,
        scene: &Scene<B::Buffer>,
        frames_in_flight: usize,
        dynamic_vertices: usize,
    ) -> RenderResult<Self> {
        if !(MIN_FRAMES_IN_FLIGHT..=MAX_FRAMES_IN_FLIGHT).contains(&frames_in_flight) {
            return Err(RenderError::FramesInFlight {
                requested: frames_in_flight,
                min: MIN_FRAMES_IN_FLIGHT,
                max: MAX_FRAMES_IN_FLIGHT,
            });
        }
        // A shorter countdown would leave some frame resources without the data.
        if scene.frames_in_flight() != frames_in_flight {
            return Err(RenderError::FrameCountMismatch {
                scene: scene.frames_in_flight(),
                ring: frames_in_flight,
            });
        }

        let counts = FrameResourceCounts {
            objects: scene.registry().len(),
            materials: scene.materials().len(),
            dynamic_vertices,
        };
        let ring = FrameResourceRing::new(&backend, frames_in_flight, counts)?;

        info!(
            "Frame scheduler ready on {} backend ({} frames in flight)",
            backend.name(),
            frames_in_flight
        );

        Ok(Self {
            ring,
            backend,
            fence_counter: 0,
            stage: None,
            frames_completed: 0,
            stats: FrameStats::default(),
        })
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn ring(&self) -> &FrameResourceRing<B> {
        &self.ring
    }

    /// Frame resource of the frame being prepared.
    #[inline]
    pub fn current_frame(&self) -> &FrameResource<B> {
        self.ring.current()
    }

    /// Last fence value handed to a submission; 0 before the first.
    #[inline]
    pub fn fence_value(&self) -> u64 {
        self.fence_counter
    }

    /// Last completed stage of the current frame, if a frame has started.
    #[inline]
    pub fn stage(&self) -> Option<FrameStage> {
        self.stage
    }

    fn expect_stage(&self, expected: Option<FrameStage>, next: FrameStage) {
        assert!(
            self.stage == expected,
            "frame stage {:?} cannot follow {:?}",
            next,
            self.stage
        );
    }

    /// Advances to the next frame resource and waits until the GPU has
    /// finished with it.
    ///
    /// # Returns
    ///
    /// Returns `true` if the call had to block.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence cannot be read or waited on.
    ///
    /// # Panics
    ///
    /// Panics if the previous frame was not submitted.
    pub fn begin_frame(&mut self) -> RhiResult<bool> {
        if self.stage.is_some() {
            self.expect_stage(Some(FrameStage::StampFence), FrameStage::AdvanceSlot);
        }

        let frame = self.ring.advance();
        self.stage = Some(FrameStage::AdvanceSlot);

        let waited = frame.wait_until_ready(self.backend.timeline())?;
        self.stage = Some(FrameStage::WaitIfBusy);

        self.stats = FrameStats {
            frame_number: self.frames_completed,
            slot: frame.index(),
            waited,
            ..FrameStats::default()
        };
        Ok(waited)
    }

    /// Writes dirty object and material constants, this frame's pass
    /// constants and, if given, the dynamic vertices into the current
    /// frame resource.
    ///
    /// # Panics
    ///
    /// Panics if [`begin_frame`](Self::begin_frame) was not called first, or
    /// if `dynamic` is given and the scheduler has no vertex region large
    /// enough for it.
    pub fn update_constants(
        &mut self,
        scene: &mut Scene<B::Buffer>,
        pass: &PassConstants,
        dynamic: Option<&dyn DynamicGeometry>,
    ) {
        self.expect_stage(Some(FrameStage::WaitIfBusy), FrameStage::UpdateConstants);

        let frame = self.ring.current_mut();
        let (items, materials) = scene.entities_mut();
        let objects_uploaded = update_object_constants(items, frame.object_constants_mut());
        let materials_uploaded =
            update_material_constants(materials, frame.material_constants_mut());
        frame.pass_constants_mut().copy_record(0, pass);

        if let Some(geometry) = dynamic {
            let Some(region) = frame.dynamic_vertices_mut() else {
                panic!("dynamic geometry given but frame resources have no vertex region");
            };
            upload_vertices(geometry, region);
        }

        trace!(
            "Frame resource {}: {} objects, {} materials uploaded",
            frame.index(),
            objects_uploaded,
            materials_uploaded
        );

        self.stats.objects_uploaded = objects_uploaded;
        self.stats.materials_uploaded = materials_uploaded;
        self.stage = Some(FrameStage::UpdateConstants);
    }

    /// Records the main pass into the current frame resource's command list.
    ///
    /// The command list is reset first, which is legal because
    /// [`begin_frame`](Self::begin_frame) waited for its last submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the command list cannot be reset or closed.
    ///
    /// # Panics
    ///
    /// Panics if [`update_constants`](Self::update_constants) was not called first.
    pub fn record(
        &mut self,
        scene: &Scene<B::Buffer>,
        pipelines: &LayerPipelines,
        clear_color: [f32; 4],
    ) -> RhiResult<u32> {
        self.expect_stage(Some(FrameStage::UpdateConstants), FrameStage::RecordCommands);

        let (commands, bindings) = self.ring.current_mut().recording();
        commands.reset()?;
        let draws = record_main_pass(commands, scene, pipelines, &bindings, clear_color);
        commands.close()?;

        self.stats.draw_calls = draws;
        self.stage = Some(FrameStage::RecordCommands);
        Ok(draws)
    }

    /// Submits the current frame, presents, and stamps the frame resource
    /// with the signalled fence value.
    ///
    /// Once the submission is accepted the fence is stamped even if the
    /// present fails, so [`flush`](Self::flush) still covers it.
    ///
    /// # Errors
    ///
    /// Returns an error if submission or presentation fails. Either is fatal
    /// to the frame loop.
    ///
    /// # Panics
    ///
    /// Panics if [`record`](Self::record) was not called first.
    pub fn submit_and_present(&mut self) -> RhiResult<FrameStats> {
        self.expect_stage(Some(FrameStage::RecordCommands), FrameStage::Submit);

        let signal_value = self.fence_counter + 1;
        let frame = self.ring.current_mut();
        self.backend.submit(frame.commands_mut(), signal_value)?;
        self.stage = Some(FrameStage::Submit);

        let presented = self.backend.present();
        self.stage = Some(FrameStage::Present);

        self.fence_counter = signal_value;
        frame.set_fence(signal_value);
        self.stage = Some(FrameStage::StampFence);

        self.frames_completed += 1;
        self.stats.fence_value = signal_value;
        presented?;
        Ok(self.stats)
    }

    /// Blocks until the GPU has finished every submission made so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn flush(&self) -> RhiResult<()> {
        if self.fence_counter == 0 {
            return Ok(());
        }
        debug!("Flushing GPU work up to fence {}", self.fence_counter);
        self.backend.timeline().wait_for_value(self.fence_counter)
    }

    /// Number of submissions the GPU has not finished yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion counter cannot be read.
    pub fn frames_in_flight(&self) -> RhiResult<u64> {
        let completed = self.backend.timeline().completed_value()?;
        Ok(self.fence_counter.saturating_sub(completed))
    }
}

impl<B: Backend> Drop for FrameScheduler<B> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!("Failed to flush GPU work during drop: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_resources::{MaterialDesc, MeshGeometry, SubmeshGeometry};
    use renderer_rhi::{BufferUsage, Completion, HeadlessBackend, HeadlessBuffer, IndexFormat};

    use crate::scene::{RenderItemDesc, SceneBuilder};

    fn scene(backend: &HeadlessBackend) -> Scene<HeadlessBuffer> {
        let vb = backend
            .create_static_buffer(BufferUsage::Vertex, &[0; 96], "vb")
            .unwrap();
        let ib = backend
            .create_static_buffer(BufferUsage::Index, &[0; 6], "ib")
            .unwrap();
        let mut mesh = MeshGeometry::new("tri", vb, 32, ib, IndexFormat::U16);
        mesh.add_submesh("tri", SubmeshGeometry::whole(3));

        let mut builder = SceneBuilder::new(3);
        let mesh = builder.add_mesh(mesh).unwrap();
        let material = builder.add_material(MaterialDesc::new("plain")).unwrap();
        builder
            .add_render_item(RenderItemDesc::new(mesh, "tri", material))
            .unwrap();
        builder.build().unwrap()
    }

    fn run_frame(scheduler: &mut FrameScheduler<HeadlessBackend>, scene: &mut Scene<HeadlessBuffer>) -> FrameStats {
        scheduler.begin_frame().unwrap();
        scheduler.update_constants(scene, &PassConstants::default(), None);
        scheduler.record(scene, &LayerPipelines::new(), [0.0; 4]).unwrap();
        scheduler.submit_and_present().unwrap()
    }

    #[test]
    fn test_stages_advance_in_order() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut scene = scene(&backend);
        let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();
        assert_eq!(scheduler.stage(), None);

        scheduler.begin_frame().unwrap();
        assert_eq!(scheduler.stage(), Some(FrameStage::WaitIfBusy));
        scheduler.update_constants(&mut scene, &PassConstants::default(), None);
        assert_eq!(scheduler.stage(), Some(FrameStage::UpdateConstants));
        scheduler.record(&scene, &LayerPipelines::new(), [0.0; 4]).unwrap();
        assert_eq!(scheduler.stage(), Some(FrameStage::RecordCommands));
        scheduler.submit_and_present().unwrap();
        assert_eq!(scheduler.stage(), Some(FrameStage::StampFence));
    }

    #[test]
    fn test_fence_stamped_after_submit() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut scene = scene(&backend);
        let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();

        for expected in 1..=4 {
            let stats = run_frame(&mut scheduler, &mut scene);
            assert_eq!(stats.fence_value, expected);
            assert_eq!(scheduler.current_frame().fence(), expected);
        }
        assert_eq!(scheduler.ring().frame(0).fence(), 4);
        assert_eq!(scheduler.ring().frame(1).fence(), 2);
        assert_eq!(scheduler.backend().present_count(), 4);
    }

    #[test]
    fn test_stats_report_uploads() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut scene = scene(&backend);
        let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();

        let uploads: Vec<usize> = (0..4)
            .map(|_| run_frame(&mut scheduler, &mut scene).objects_uploaded)
            .collect();
        assert_eq!(uploads, vec![1, 1, 1, 0]);
    }

    #[test]
    #[should_panic(expected = "cannot follow")]
    fn test_record_before_update_panics() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let scene = scene(&backend);
        let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();
        scheduler.begin_frame().unwrap();
        let _ = scheduler.record(&scene, &LayerPipelines::new(), [0.0; 4]);
    }

    #[test]
    #[should_panic(expected = "cannot follow")]
    fn test_begin_twice_panics() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let scene = scene(&backend);
        let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();
        scheduler.begin_frame().unwrap();
        scheduler.begin_frame().unwrap();
    }

    #[test]
    fn test_failed_present_still_stamps_fence() {
        let backend = HeadlessBackend::new(Completion::Manual).unwrap();
        let mut scene = scene(&backend);
        let mut scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();
        run_frame(&mut scheduler, &mut scene);

        scheduler.backend().fail_next_present();
        scheduler.begin_frame().unwrap();
        scheduler.update_constants(&mut scene, &PassConstants::default(), None);
        scheduler.record(&scene, &LayerPipelines::new(), [0.0; 4]).unwrap();
        assert!(scheduler.submit_and_present().is_err());

        assert_eq!(scheduler.fence_value(), 2);
        assert_eq!(scheduler.current_frame().fence(), 2);
        assert_eq!(scheduler.frames_in_flight().unwrap(), 2);

        scheduler.backend().timeline().complete_all();
        scheduler.flush().unwrap();
        assert_eq!(scheduler.backend().timeline().completed_value().unwrap(), 2);
    }

    #[test]
    fn test_scene_ring_depth_mismatch_is_error() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let scene = scene(&backend);
        assert_eq!(scene.frames_in_flight(), 3);

        let result = FrameScheduler::new(backend, &scene, 2, 0);
        assert!(matches!(
            result,
            Err(RenderError::FrameCountMismatch { scene: 3, ring: 2 })
        ));
    }

    #[test]
    fn test_ring_depth_out_of_range_is_error() {
        for frames in [0, 1, MAX_FRAMES_IN_FLIGHT + 1] {
            let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
            let scene = scene(&backend);
            assert!(matches!(
                FrameScheduler::new(backend, &scene, frames, 0),
                Err(RenderError::FramesInFlight { requested, .. }) if requested == frames
            ));
        }
    }

    #[test]
    fn test_flush_without_frames() {
        let backend = HeadlessBackend::new(Completion::Manual).unwrap();
        let scene = scene(&backend);
        let scheduler = FrameScheduler::new(backend, &scene, 3, 0).unwrap();
        scheduler.flush().unwrap();
    }
}
