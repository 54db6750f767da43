//! Headless backend with a simulated GPU.
//!
//! The simulated GPU executes nothing; it only tracks submissions and
//! advances the timeline the way a real queue would. Buffers are host byte
//! vectors with synthetic GPU addresses, and command lists record a
//! [`Command`] log that can be inspected after submission.
//!
//! # Completion modes
//!
//! - [`Completion::Immediate`] completes every submission as it is made.
//! - [`Completion::Delayed`] completes submissions in order on a worker
//!   thread, each taking a fixed time.
//! - [`Completion::Manual`] leaves completion to the caller
//!   ([`SimulatedTimeline::complete_next`], [`SimulatedTimeline::complete_all`]).
//!
//! # Example
//!
//! ```
//! use renderer_rhi::{Backend, CommandList, Completion, GpuTimeline, HeadlessBackend};
//!
//! let backend = HeadlessBackend::new(Completion::Manual).unwrap();
//! let mut commands = backend.create_command_list().unwrap();
//! commands.reset().unwrap();
//! commands.close().unwrap();
//!
//! backend.submit(&mut commands, 1).unwrap();
//! assert_eq!(backend.timeline().completed_value().unwrap(), 0);
//!
//! backend.timeline().complete_all();
//! backend.timeline().wait_for_value(1).unwrap();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytemuck::Pod;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::backend::{
    Backend, BufferHandle, BufferUsage, CommandList, DrawIndexed, GeometryBinding, GpuAddress,
    GpuTimeline, MappedBuffer, PipelineHandle, PrimitiveTopology, TextureSlot,
};
use crate::error::{RhiError, RhiResult};

/// First synthetic GPU address handed out.
const ADDRESS_BASE: u64 = 0x1_0000_0000;

/// Placement alignment of synthetic allocations.
const ADDRESS_ALIGNMENT: u64 = 64 * 1024;

/// Constant record alignment reported by the headless device.
const CONSTANT_ALIGNMENT: u64 = 256;

/// Submissions kept for inspection by [`HeadlessBackend::submissions`].
pub const SUBMISSION_HISTORY: usize = 64;

/// How the simulated GPU completes submitted work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Work completes as soon as it is submitted.
    Immediate,
    /// Work completes in order, each submission taking the given time.
    Delayed(Duration),
    /// Work completes only when the caller says so.
    Manual,
}

/// One recorded command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginPass { clear_color: [f32; 4] },
    EndPass,
    BindPipeline(PipelineHandle),
    SetPassConstants(GpuAddress),
    SetGeometry(GeometryBinding),
    SetTopology(PrimitiveTopology),
    SetTexture(TextureSlot),
    SetObjectConstants(GpuAddress),
    SetMaterialConstants(GpuAddress),
    DrawIndexed(DrawIndexed),
}

/// A submitted command list and the timeline value signalled after it.
#[derive(Clone, Debug)]
pub struct Submission {
    pub signal_value: u64,
    pub commands: Vec<Command>,
}

#[derive(Debug)]
struct Pending {
    value: u64,
    ready_at: Instant,
}

#[derive(Debug, Default)]
struct TimelineState {
    completed: u64,
    last_signalled: u64,
    pending: VecDeque<Pending>,
    busy_until: Option<Instant>,
    shutdown: bool,
}

/// Completion counter of the simulated queue.
#[derive(Debug)]
pub struct SimulatedTimeline {
    mode: Completion,
    state: Mutex<TimelineState>,
    /// Notified whenever `completed` advances.
    completed_cv: Condvar,
    /// Notified whenever work is queued or the worker should exit.
    work_cv: Condvar,
}

impl SimulatedTimeline {
    fn new(mode: Completion) -> Self {
        Self {
            mode,
            state: Mutex::new(TimelineState::default()),
            completed_cv: Condvar::new(),
            work_cv: Condvar::new(),
        }
    }

    /// Completion mode of this timeline.
    #[inline]
    pub fn mode(&self) -> Completion {
        self.mode
    }

    /// Queues a signal of `value` behind all earlier work.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not greater than every previously signalled value.
    fn signal(&self, value: u64) {
        let mut state = self.state.lock();
        assert!(
            value > state.last_signalled,
            "timeline values must increase: {} after {}",
            value,
            state.last_signalled
        );
        state.last_signalled = value;

        match self.mode {
            Completion::Immediate => {
                state.completed = value;
                self.completed_cv.notify_all();
            }
            Completion::Delayed(latency) => {
                let start = state
                    .busy_until
                    .map_or_else(Instant::now, |busy| busy.max(Instant::now()));
                let ready_at = start + latency;
                state.busy_until = Some(ready_at);
                state.pending.push_back(Pending { value, ready_at });
                self.work_cv.notify_one();
            }
            Completion::Manual => {
                state.pending.push_back(Pending {
                    value,
                    ready_at: Instant::now(),
                });
            }
        }
    }

    /// Completes the oldest outstanding submission and returns its value.
    pub fn complete_next(&self) -> Option<u64> {
        let mut state = self.state.lock();
        let next = state.pending.pop_front()?;
        state.completed = next.value;
        self.completed_cv.notify_all();
        trace!("Simulated GPU completed {}", next.value);
        Some(next.value)
    }

    /// Completes every outstanding submission.
    pub fn complete_all(&self) {
        let mut state = self.state.lock();
        if let Some(last) = state.pending.pop_back() {
            state.pending.clear();
            state.completed = last.value;
            self.completed_cv.notify_all();
        }
    }

    /// Number of submissions not yet completed.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Highest value signalled so far, completed or not.
    pub fn last_signalled(&self) -> u64 {
        self.state.lock().last_signalled
    }

    fn run_worker(&self) {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                break;
            }
            let Some(ready_at) = state.pending.front().map(|p| p.ready_at) else {
                self.work_cv.wait(&mut state);
                continue;
            };
            if Instant::now() < ready_at {
                self.work_cv.wait_until(&mut state, ready_at);
                continue;
            }
            if let Some(done) = state.pending.pop_front() {
                state.completed = done.value;
                self.completed_cv.notify_all();
            }
        }
        // Drain so no waiter is left behind after shutdown.
        if let Some(last) = state.pending.pop_back() {
            state.pending.clear();
            state.completed = last.value;
        }
        self.completed_cv.notify_all();
    }

    fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.work_cv.notify_all();
    }
}

impl GpuTimeline for SimulatedTimeline {
    fn completed_value(&self) -> RhiResult<u64> {
        Ok(self.state.lock().completed)
    }

    fn wait_for_value(&self, value: u64) -> RhiResult<()> {
        let mut state = self.state.lock();
        while state.completed < value {
            if state.shutdown && state.pending.is_empty() {
                return Err(RhiError::DeviceLost(format!(
                    "simulated GPU shut down before reaching {value}"
                )));
            }
            self.completed_cv.wait(&mut state);
        }
        Ok(())
    }
}

/// Host-memory buffer with a synthetic GPU address.
#[derive(Debug)]
pub struct HeadlessBuffer {
    data: Vec<u8>,
    address: GpuAddress,
    handle: BufferHandle,
    usage: BufferUsage,
    label: String,
}

impl HeadlessBuffer {
    /// Current contents, as the GPU would see them.
    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Reads a plain-data value at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the value does not fit in the buffer.
    pub fn read<T: Pod>(&self, offset: u64) -> T {
        let start = offset as usize;
        bytemuck::pod_read_unaligned(&self.data[start..start + size_of::<T>()])
    }

    /// Debug label given at creation.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// How the GPU reads this buffer.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl MappedBuffer for HeadlessBuffer {
    #[inline]
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    #[inline]
    fn gpu_address(&self) -> GpuAddress {
        self.address
    }

    #[inline]
    fn handle(&self) -> BufferHandle {
        self.handle
    }

    fn write(&mut self, offset: u64, data: &[u8]) {
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= self.data.len(),
            "write of {} bytes at {} exceeds buffer '{}' of {} bytes",
            data.len(),
            offset,
            self.label,
            self.data.len()
        );
        self.data[start..end].copy_from_slice(data);
    }
}

/// Command list that records into a [`Command`] log.
#[derive(Debug, Default)]
pub struct HeadlessCommandList {
    commands: Vec<Command>,
    recording: bool,
}

impl HeadlessCommandList {
    /// Commands recorded since the last reset.
    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns true between `reset` and `close`.
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    fn record(&mut self, command: Command) {
        debug_assert!(self.recording, "command recorded on a closed list");
        self.commands.push(command);
    }
}

impl CommandList for HeadlessCommandList {
    fn reset(&mut self) -> RhiResult<()> {
        self.commands.clear();
        self.recording = true;
        Ok(())
    }

    fn begin_pass(&mut self, clear_color: [f32; 4]) {
        self.record(Command::BeginPass { clear_color });
    }

    fn end_pass(&mut self) {
        self.record(Command::EndPass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.record(Command::BindPipeline(pipeline));
    }

    fn set_pass_constants(&mut self, address: GpuAddress) {
        self.record(Command::SetPassConstants(address));
    }

    fn set_geometry(&mut self, geometry: &GeometryBinding) {
        self.record(Command::SetGeometry(*geometry));
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::SetTopology(topology));
    }

    fn set_texture(&mut self, slot: TextureSlot) {
        self.record(Command::SetTexture(slot));
    }

    fn set_object_constants(&mut self, address: GpuAddress) {
        self.record(Command::SetObjectConstants(address));
    }

    fn set_material_constants(&mut self, address: GpuAddress) {
        self.record(Command::SetMaterialConstants(address));
    }

    fn draw_indexed(&mut self, args: DrawIndexed) {
        self.record(Command::DrawIndexed(args));
    }

    fn close(&mut self) -> RhiResult<()> {
        self.recording = false;
        Ok(())
    }
}

/// Backend whose GPU is simulated on the host.
pub struct HeadlessBackend {
    timeline: Arc<SimulatedTimeline>,
    worker: Option<JoinHandle<()>>,
    next_address: AtomicU64,
    next_handle: AtomicU64,
    /// The most recent submissions, at most [`SUBMISSION_HISTORY`].
    submissions: Mutex<VecDeque<Submission>>,
    submitted: AtomicU64,
    presents: AtomicU64,
    fail_next_present: AtomicBool,
}

impl HeadlessBackend {
    /// Creates a headless backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion worker thread cannot be spawned.
    pub fn new(completion: Completion) -> RhiResult<Self> {
        let timeline = Arc::new(SimulatedTimeline::new(completion));

        let worker = match completion {
            Completion::Delayed(_) => {
                let gpu = Arc::clone(&timeline);
                let handle = std::thread::Builder::new()
                    .name("simulated-gpu".to_string())
                    .spawn(move || gpu.run_worker())
                    .map_err(|e| RhiError::DeviceLost(format!("failed to spawn GPU thread: {e}")))?;
                Some(handle)
            }
            Completion::Immediate | Completion::Manual => None,
        };

        info!("Headless backend created ({:?})", completion);

        Ok(Self {
            timeline,
            worker,
            next_address: AtomicU64::new(ADDRESS_BASE),
            next_handle: AtomicU64::new(1),
            submissions: Mutex::new(VecDeque::with_capacity(SUBMISSION_HISTORY)),
            submitted: AtomicU64::new(0),
            presents: AtomicU64::new(0),
            fail_next_present: AtomicBool::new(false),
        })
    }

    /// Shared handle to the timeline, for driving completion from another thread.
    #[inline]
    pub fn timeline_handle(&self) -> Arc<SimulatedTimeline> {
        Arc::clone(&self.timeline)
    }

    /// The most recent submissions, oldest first. Older ones are dropped
    /// once [`SUBMISSION_HISTORY`] are kept.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().iter().cloned().collect()
    }

    /// Number of submissions made so far, including dropped ones.
    pub fn submission_count(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Number of successful presents so far.
    pub fn present_count(&self) -> u64 {
        self.presents.load(Ordering::Relaxed)
    }

    /// Makes the next [`present`](Backend::present) fail, as a lost
    /// surface would.
    pub fn fail_next_present(&self) {
        self.fail_next_present.store(true, Ordering::Relaxed);
    }

    fn allocate(&self, usage: BufferUsage, size: u64, label: &str) -> RhiResult<HeadlessBuffer> {
        if size == 0 {
            return Err(RhiError::BufferError(format!(
                "buffer '{label}' must be larger than 0 bytes"
            )));
        }
        let reserved = size.div_ceil(ADDRESS_ALIGNMENT) * ADDRESS_ALIGNMENT;
        let address = self.next_address.fetch_add(reserved, Ordering::Relaxed);
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);

        debug!("Created headless buffer '{}': {} bytes at {:#x}", label, size, address);

        Ok(HeadlessBuffer {
            data: vec![0; size as usize],
            address: GpuAddress(address),
            handle: BufferHandle(handle),
            usage,
            label: label.to_string(),
        })
    }
}

impl Backend for HeadlessBackend {
    type Buffer = HeadlessBuffer;
    type CommandList = HeadlessCommandList;
    type Timeline = SimulatedTimeline;

    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_upload_buffer(
        &self,
        usage: BufferUsage,
        size: u64,
        label: &str,
    ) -> RhiResult<HeadlessBuffer> {
        self.allocate(usage, size, label)
    }

    fn create_static_buffer(
        &self,
        usage: BufferUsage,
        data: &[u8],
        label: &str,
    ) -> RhiResult<HeadlessBuffer> {
        let mut buffer = self.allocate(usage, data.len() as u64, label)?;
        buffer.write(0, data);
        trace!("Filled {} buffer '{}'", usage.name(), label);
        Ok(buffer)
    }

    fn create_command_list(&self) -> RhiResult<HeadlessCommandList> {
        Ok(HeadlessCommandList::default())
    }

    #[inline]
    fn timeline(&self) -> &SimulatedTimeline {
        &self.timeline
    }

    #[inline]
    fn min_constant_alignment(&self) -> u64 {
        CONSTANT_ALIGNMENT
    }

    fn submit(&self, commands: &mut HeadlessCommandList, signal_value: u64) -> RhiResult<()> {
        assert!(
            !commands.is_recording(),
            "command list must be closed before submission"
        );
        {
            let mut submissions = self.submissions.lock();
            if submissions.len() == SUBMISSION_HISTORY {
                submissions.pop_front();
            }
            submissions.push_back(Submission {
                signal_value,
                commands: commands.commands.clone(),
            });
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.timeline.signal(signal_value);
        trace!("Submitted {} commands, signal {}", commands.commands.len(), signal_value);
        Ok(())
    }

    fn present(&self) -> RhiResult<()> {
        if self.fail_next_present.swap(false, Ordering::Relaxed) {
            return Err(RhiError::DeviceLost("present failed".to_string()));
        }
        self.presents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        self.timeline.shutdown();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("Simulated GPU thread panicked");
        }
        debug!("Headless backend destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_list(backend: &HeadlessBackend) -> HeadlessCommandList {
        let mut list = backend.create_command_list().unwrap();
        list.reset().unwrap();
        list.close().unwrap();
        list
    }

    #[test]
    fn test_immediate_completion() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut list = closed_list(&backend);
        backend.submit(&mut list, 1).unwrap();
        backend.submit(&mut list, 2).unwrap();
        assert_eq!(backend.timeline().completed_value().unwrap(), 2);
        assert_eq!(backend.submission_count(), 2);
    }

    #[test]
    fn test_manual_completion_in_order() {
        let backend = HeadlessBackend::new(Completion::Manual).unwrap();
        let mut list = closed_list(&backend);
        for value in 1..=3 {
            backend.submit(&mut list, value).unwrap();
        }
        let timeline = backend.timeline();
        assert_eq!(timeline.completed_value().unwrap(), 0);
        assert_eq!(timeline.pending_count(), 3);

        assert_eq!(timeline.complete_next(), Some(1));
        assert_eq!(timeline.completed_value().unwrap(), 1);

        timeline.complete_all();
        assert_eq!(timeline.completed_value().unwrap(), 3);
        assert_eq!(timeline.complete_next(), None);
    }

    #[test]
    fn test_wait_blocks_until_completed() {
        let backend = HeadlessBackend::new(Completion::Manual).unwrap();
        let mut list = closed_list(&backend);
        backend.submit(&mut list, 1).unwrap();

        let gpu = backend.timeline_handle();
        let completer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            gpu.complete_next()
        });

        let started = Instant::now();
        backend.timeline().wait_for_value(1).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(15));
        assert_eq!(backend.timeline().completed_value().unwrap(), 1);
        assert_eq!(completer.join().unwrap(), Some(1));
    }

    #[test]
    fn test_delayed_completion_advances() {
        let backend = HeadlessBackend::new(Completion::Delayed(Duration::from_millis(2))).unwrap();
        let mut list = closed_list(&backend);
        for value in 1..=4 {
            backend.submit(&mut list, value).unwrap();
        }
        backend.timeline().wait_for_value(4).unwrap();
        assert_eq!(backend.timeline().completed_value().unwrap(), 4);
        assert_eq!(backend.timeline().pending_count(), 0);
    }

    #[test]
    #[should_panic(expected = "timeline values must increase")]
    fn test_signal_values_must_increase() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut list = closed_list(&backend);
        backend.submit(&mut list, 2).unwrap();
        backend.submit(&mut list, 2).unwrap();
    }

    #[test]
    fn test_buffers_get_distinct_addresses() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let a = backend.create_upload_buffer(BufferUsage::Uniform, 300, "a").unwrap();
        let b = backend.create_upload_buffer(BufferUsage::Uniform, 300, "b").unwrap();
        assert_ne!(a.handle(), b.handle());
        assert!(b.gpu_address().raw() >= a.gpu_address().raw() + a.size());
        assert_eq!(a.gpu_address().raw() % ADDRESS_ALIGNMENT, 0);
    }

    #[test]
    fn test_buffer_write_and_read() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut buffer = backend.create_upload_buffer(BufferUsage::Uniform, 16, "scratch").unwrap();
        buffer.write(4, bytemuck::bytes_of(&7u32));
        assert_eq!(buffer.read::<u32>(4), 7);
        assert_eq!(buffer.read::<u32>(0), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds buffer")]
    fn test_buffer_write_out_of_range_panics() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut buffer = backend.create_upload_buffer(BufferUsage::Uniform, 8, "small").unwrap();
        buffer.write(4, &[0u8; 8]);
    }

    #[test]
    fn test_zero_sized_buffer_is_error() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        assert!(matches!(
            backend.create_upload_buffer(BufferUsage::Uniform, 0, "empty"),
            Err(RhiError::BufferError(_))
        ));
    }

    #[test]
    fn test_command_log_recorded() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut list = backend.create_command_list().unwrap();
        list.reset().unwrap();
        list.set_topology(PrimitiveTopology::TriangleList);
        list.draw_indexed(DrawIndexed {
            index_count: 36,
            instance_count: 1,
            start_index: 0,
            base_vertex: 0,
            start_instance: 0,
        });
        list.close().unwrap();
        backend.submit(&mut list, 1).unwrap();

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].signal_value, 1);
        assert_eq!(submissions[0].commands.len(), 2);
        assert_eq!(
            submissions[0].commands[0],
            Command::SetTopology(PrimitiveTopology::TriangleList)
        );
    }

    #[test]
    fn test_submission_history_is_bounded() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let mut list = closed_list(&backend);
        let total = SUBMISSION_HISTORY as u64 * 4;
        for value in 1..=total {
            backend.submit(&mut list, value).unwrap();
        }

        let kept = backend.submissions();
        assert_eq!(kept.len(), SUBMISSION_HISTORY);
        assert_eq!(kept.first().unwrap().signal_value, total - SUBMISSION_HISTORY as u64 + 1);
        assert_eq!(kept.last().unwrap().signal_value, total);
        assert_eq!(backend.submission_count(), total);
    }

    #[test]
    fn test_upload_buffer_keeps_usage() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        let vertices = backend.create_upload_buffer(BufferUsage::Vertex, 64, "vertices").unwrap();
        let constants = backend.create_upload_buffer(BufferUsage::Uniform, 64, "constants").unwrap();
        assert_eq!(vertices.usage(), BufferUsage::Vertex);
        assert_eq!(constants.usage(), BufferUsage::Uniform);
    }

    #[test]
    fn test_failed_present_is_one_shot() {
        let backend = HeadlessBackend::new(Completion::Immediate).unwrap();
        backend.fail_next_present();
        assert!(matches!(backend.present(), Err(RhiError::DeviceLost(_))));
        backend.present().unwrap();
        assert_eq!(backend.present_count(), 1);
    }

    #[test]
    fn test_headless_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HeadlessBackend>();
        assert_send_sync::<SimulatedTimeline>();
    }
}
