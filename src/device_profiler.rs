//! The device profiler: singleton per logical GPU (spec.md §3). Owns every
//! registry the rest of the crate operates on and is what
//! [`crate::core::dispatch::DispatchRegistry`] maps a `VkDevice` to.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use ash::vk;
use ash::vk::Handle;

use crate::aggregate::{build_frame, FrameAggregator, FrameData, ResolvedSubmission};
use crate::arena::{Arena, ArenaIndex};
use crate::command::{
    CommandBufferLevel, CommandBufferRecord, CommandRecorder, PipelineKind, PipelineRecord, RenderPassRecord,
};
use crate::config::{FrameDelimiterMode, ProfilerConfig};
use crate::core::device::Device;
use crate::core::error::ProfilerError;
use crate::debug_names::DebugNameRegistry;
use crate::memory::MemoryProfiler;
use crate::query::counters::{CounterUnit, NullCounters, PerformanceCounters};
use crate::query::TimestampQueryPool;
use crate::submit::resolver::resolve_command_buffer;
use crate::submit::tracker::{order_by_host_time, SubmitInfo, SubmitTracker};

struct Registries {
    pipelines: Arena<PipelineRecord>,
    pipeline_by_handle: HashMap<u64, ArenaIndex>,
    render_passes: Arena<RenderPassRecord>,
    render_pass_by_handle: HashMap<u64, ArenaIndex>,
    command_buffers: Arena<CommandBufferRecord>,
    command_buffer_by_handle: HashMap<u64, ArenaIndex>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            pipelines: Arena::new(),
            pipeline_by_handle: HashMap::new(),
            render_passes: Arena::new(),
            render_pass_by_handle: HashMap::new(),
            command_buffers: Arena::new(),
            command_buffer_by_handle: HashMap::new(),
        }
    }
}

/// Accumulates resolved submissions for the frame currently being built,
/// plus how many submits have been seen since the last delimiter.
#[derive(Default)]
struct FrameInProgress {
    submissions: Vec<ResolvedSubmission>,
    submits_since_delimiter: u32,
}

pub struct DeviceProfiler {
    device: Device,
    config: RwLock<ProfilerConfig>,
    registries: RwLock<Registries>,
    submit_tracker: SubmitTracker,
    counters: Mutex<Box<dyn PerformanceCounters>>,
    /// Counter name/unit pairs in canonical counter-index order, matching
    /// the order values arrive in from `PerformanceCounters::parse_report`.
    counter_descriptions: RwLock<Vec<(String, CounterUnit)>>,
    debug_names: DebugNameRegistry,
    memory: MemoryProfiler,
    aggregator: FrameAggregator,
    in_progress: Mutex<FrameInProgress>,
}

impl DeviceProfiler {
    pub fn new(device: Device, config: ProfilerConfig) -> Self {
        let memory_interval = config.memory_sampler_interval;
        Self {
            device,
            config: RwLock::new(config),
            registries: RwLock::new(Registries::default()),
            submit_tracker: SubmitTracker::new(),
            counters: Mutex::new(Box::new(NullCounters::default())),
            counter_descriptions: RwLock::new(Vec::new()),
            debug_names: DebugNameRegistry::new(),
            memory: MemoryProfiler::new(memory_interval),
            aggregator: FrameAggregator::new(),
            in_progress: Mutex::new(FrameInProgress::default()),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn debug_names(&self) -> &DebugNameRegistry {
        &self.debug_names
    }

    pub fn memory(&self) -> &MemoryProfiler {
        &self.memory
    }

    pub fn config(&self) -> ProfilerConfig {
        self.config.read().unwrap().clone()
    }

    /// Clones the metrics sets the active counters backend reports. Empty
    /// when no vendor backend has been loaded beyond [`NullCounters`].
    pub fn metrics_sets(&self) -> Vec<crate::query::counters::MetricsSet> {
        self.counters.lock().unwrap().metrics_sets().to_vec()
    }

    pub fn set_active_metrics_set(&self, index: usize) -> Result<(), ProfilerError> {
        self.counters.lock().unwrap().set_active_metrics_set(index)
    }

    pub fn metrics_properties(&self, set: usize) -> Option<crate::query::counters::MetricsSet> {
        self.counters.lock().unwrap().metrics_properties(set).cloned()
    }

    pub fn set_frame_delimiter(&self, mode: FrameDelimiterMode, n: u32) {
        let mut config = self.config.write().unwrap();
        config.frame_delimiter_mode = mode;
        config.frame_delimiter_n = n.max(1);
    }

    pub fn set_sampling_mode(&self, mode: crate::config::SamplingMode) {
        self.config.write().unwrap().sampling_mode = mode;
    }

    // --- Pipeline / render-pass registries -------------------------------------------------

    pub fn register_pipeline(&self, handle: vk::Pipeline, kind: PipelineKind, stage_fingerprints: Vec<u64>, fingerprint: crate::command::PipelineFingerprint) -> ArenaIndex {
        let record = PipelineRecord {
            handle,
            kind,
            stage_fingerprints,
            fingerprint,
            name: None,
        };
        let mut registries = self.registries.write().unwrap();
        let index = registries.pipelines.insert(record);
        registries.pipeline_by_handle.insert(handle.as_raw(), index);
        index
    }

    pub fn pipeline_index(&self, handle: vk::Pipeline) -> Result<ArenaIndex, ProfilerError> {
        self.registries
            .read()
            .unwrap()
            .pipeline_by_handle
            .get(&handle.as_raw())
            .copied()
            .ok_or(ProfilerError::InvalidHandle)
    }

    /// Deferred destroy: the caller (intercepted `vkDestroyPipeline`) must
    /// only call this once no in-flight submission can still reference the
    /// pipeline — the profiler does not itself track pipeline liveness
    /// against in-flight fences, since pipeline lifetime is the
    /// application's responsibility under the Vulkan spec.
    pub fn destroy_pipeline(&self, handle: vk::Pipeline) {
        let mut registries = self.registries.write().unwrap();
        if let Some(index) = registries.pipeline_by_handle.remove(&handle.as_raw()) {
            registries.pipelines.remove(index);
        }
    }

    pub fn register_render_pass(&self, handle: vk::RenderPass, subpasses: Vec<crate::command::SubpassDescriptor>) -> ArenaIndex {
        let record = RenderPassRecord {
            handle,
            subpasses,
            name: None,
        };
        let mut registries = self.registries.write().unwrap();
        let index = registries.render_passes.insert(record);
        registries.render_pass_by_handle.insert(handle.as_raw(), index);
        index
    }

    pub fn destroy_render_pass(&self, handle: vk::RenderPass) {
        let mut registries = self.registries.write().unwrap();
        if let Some(index) = registries.render_pass_by_handle.remove(&handle.as_raw()) {
            registries.render_passes.remove(index);
        }
    }

    // --- Command buffers --------------------------------------------------------------------

    pub fn allocate_command_buffer(&self, handle: vk::CommandBuffer, level: CommandBufferLevel, queue_family: u32) -> ArenaIndex {
        let pool = TimestampQueryPool::new(self.device.clone(), queue_family);
        let record = CommandBufferRecord::new(handle, level, queue_family, pool);
        let mut registries = self.registries.write().unwrap();
        let index = registries.command_buffers.insert(record);
        registries.command_buffer_by_handle.insert(handle.as_raw(), index);
        index
    }

    /// Frees a command buffer. If it is still `Pending`, detaches the
    /// record from the registry into the owning submit batch instead of
    /// dropping it, per spec.md §4.5.
    pub fn free_command_buffer(&self, handle: vk::CommandBuffer) {
        let mut registries = self.registries.write().unwrap();
        let Some(index) = registries.command_buffer_by_handle.remove(&handle.as_raw()) else {
            return;
        };
        let Some(record) = registries.command_buffers.get(index) else {
            return;
        };
        if record.state == crate::command::CommandBufferState::Pending {
            let fence = record.owning_fence;
            if let Some(record) = registries.command_buffers.remove(index) {
                drop(registries);
                if let Some(fence) = fence {
                    self.submit_tracker.detach(fence, record);
                }
            }
        } else {
            registries.command_buffers.remove(index);
        }
    }

    /// Runs `f` with exclusive access to the command buffer's recorder.
    pub fn with_recorder<R>(&self, handle: vk::CommandBuffer, f: impl FnOnce(&mut CommandRecorder) -> R) -> Result<R, ProfilerError> {
        let mut registries = self.registries.write().unwrap();
        let index = *registries
            .command_buffer_by_handle
            .get(&handle.as_raw())
            .ok_or(ProfilerError::InvalidHandle)?;
        let record = registries.command_buffers.get_mut(index).ok_or(ProfilerError::InvalidHandle)?;
        let mut recorder = CommandRecorder::new(record);
        Ok(f(&mut recorder))
    }

    // --- Submit / resolve / aggregate -------------------------------------------------------

    pub fn submit<F>(
        &self,
        queue_family: u32,
        command_buffers: Vec<Vec<vk::CommandBuffer>>,
        application_fence: Option<vk::Fence>,
        forward: F,
    ) -> Result<(), ProfilerError>
    where
        F: FnOnce(vk::Fence) -> Result<(), ProfilerError>,
    {
        let mut registries = self.registries.write().unwrap();
        let submits: Vec<SubmitInfo> = command_buffers
            .into_iter()
            .map(|cbs| SubmitInfo {
                command_buffers: cbs
                    .into_iter()
                    .filter_map(|h| registries.command_buffer_by_handle.get(&h.as_raw()).copied())
                    .collect(),
            })
            .collect();

        let fence = self.submit_tracker.submit(
            &self.device,
            &mut registries.command_buffers,
            queue_family,
            submits.clone(),
            application_fence,
            forward,
        )?;

        if let Some(fence) = fence {
            for submit in &submits {
                for &index in &submit.command_buffers {
                    if let Some(record) = registries.command_buffers.get_mut(index) {
                        record.owning_fence = Some(fence);
                    }
                }
            }
        }

        drop(registries);
        let mut progress = self.in_progress.lock().unwrap();
        progress.submits_since_delimiter += 1;
        let delimiter_n = self.config.read().unwrap().frame_delimiter_n;
        let mode = self.config.read().unwrap().frame_delimiter_mode;
        if mode == FrameDelimiterMode::EveryNSubmits && progress.submits_since_delimiter >= delimiter_n {
            drop(progress);
            self.delimit_frame();
        }
        Ok(())
    }

    /// Called from intercepted `vkQueuePresentKHR`. A no-op unless the
    /// delimiter mode is `present`.
    pub fn on_present(&self) {
        if self.config.read().unwrap().frame_delimiter_mode == FrameDelimiterMode::Present {
            self.delimit_frame();
        }
    }

    /// Pulls every signaled submit batch, resolves its command buffers, and
    /// appends them to the frame in progress. Safe to call from a worker
    /// thread on an interval, or synchronously before a delimiter.
    ///
    /// Counter reports are not yet threaded through: `resolve_command_buffer`
    /// is called with no raw query bytes, since the profiler has no backend
    /// wired up beyond [`crate::query::counters::NullCounters`], which never
    /// reports data for any custom set. Once a real backend is loaded this
    /// call site is where its raw per-command-buffer bytes would be read and
    /// passed through.
    pub fn poll_and_resolve(&self) {
        let mut batches = self.submit_tracker.drain_signaled(&self.device);
        if batches.is_empty() {
            return;
        }
        // Batches drained here can come from independent queues that each
        // submitted in their own order; sorting by host-clock submit time
        // keeps cross-queue submissions in the frame's timeline in the
        // order the application actually issued them.
        order_by_host_time(&mut batches);
        let registries = self.registries.read().unwrap();
        let mut progress = self.in_progress.lock().unwrap();

        for batch in batches {
            for submit in &batch.submits {
                for &index in &submit.command_buffers {
                    let Some(record) = registries.command_buffers.get(index) else {
                        continue;
                    };
                    let resolved = match resolve_command_buffer(&self.device, record, None) {
                        Ok(resolved) => resolved,
                        Err(e) => {
                            log::warn!("failed to resolve command buffer {index:?}: {e}");
                            continue;
                        }
                    };

                    let mut secondaries = HashMap::new();
                    for command in &record.commands {
                        if let crate::command::CommandKind::ExecuteCommands { secondaries: refs } = &command.kind {
                            for &secondary_index in refs {
                                let Some(secondary_record) = registries.command_buffers.get(secondary_index) else {
                                    continue;
                                };
                                match resolve_command_buffer(&self.device, secondary_record, None) {
                                    Ok(resolved_secondary) => {
                                        secondaries.insert(secondary_index, resolved_secondary);
                                    }
                                    Err(e) => {
                                        log::warn!("failed to resolve secondary command buffer {secondary_index:?}: {e}");
                                    }
                                }
                            }
                        }
                    }

                    progress.submissions.push(ResolvedSubmission {
                        queue_family: batch.queue_family,
                        primary: resolved,
                        secondaries,
                    });
                }
            }
        }
    }

    /// Forces a frame boundary: resolves any outstanding signaled work,
    /// then publishes whatever has accumulated since the last delimiter —
    /// even if nothing submitted, so `flush` never blocks waiting for GPU
    /// work that was never issued.
    pub fn delimit_frame(&self) {
        self.poll_and_resolve();
        let mut progress = self.in_progress.lock().unwrap();
        let submissions = std::mem::take(&mut progress.submissions);
        progress.submits_since_delimiter = 0;
        drop(progress);

        let registries = self.registries.read().unwrap();
        let index = self.aggregator.allocate_frame_index();
        let descriptions = self.counter_descriptions.read().unwrap();
        let frame = build_frame(index, submissions, &registries.pipelines, &registries.render_passes, &descriptions);
        self.aggregator.publish(frame);
    }

    pub fn get_frame_data(&self) -> Result<FrameData, ProfilerError> {
        self.aggregator.get_frame_data()
    }

    pub fn flush(&self) {
        self.delimit_frame();
    }
}
