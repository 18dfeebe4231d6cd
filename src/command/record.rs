//! Registry record types: pipelines, render passes, and command buffers.
//!
//! All three are stored in [`crate::arena::Arena`]s owned by the device
//! profiler; code elsewhere only ever holds an [`crate::arena::ArenaIndex`]
//! into one of these arenas, never a raw handle.

use ash::vk;

use crate::arena::ArenaIndex;
use crate::command::command::{BindPoint, Command, PipelineFingerprint, SubpassContents};
use crate::query::TimestampQueryPool;

/// Bind point a pipeline was created for. Mirrors [`BindPoint`] but is kept
/// distinct because acceleration-structure pipelines are a ray-tracing
/// specialization rather than a fourth bind point in the Vulkan API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Graphics,
    Compute,
    RayTracing,
}

/// Handle, bind point, shader fingerprints. Immutable once created;
/// destruction is deferred by the caller past the last in-flight submission
/// referencing it (the profiler does not pin Vulkan object lifetime itself —
/// it only refuses to resolve a destroyed pipeline's late references).
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub handle: vk::Pipeline,
    pub kind: PipelineKind,
    /// Per-stage SPIR-V fingerprints, in pipeline-stage order.
    pub stage_fingerprints: Vec<u64>,
    pub fingerprint: PipelineFingerprint,
    pub name: Option<String>,
}

/// One subpass's static description.
#[derive(Debug, Clone, Copy)]
pub struct SubpassDescriptor {
    pub contents: SubpassContents,
}

/// Handle plus its ordered subpass descriptors.
#[derive(Debug, Clone)]
pub struct RenderPassRecord {
    pub handle: vk::RenderPass,
    pub subpasses: Vec<SubpassDescriptor>,
    pub name: Option<String>,
}

impl RenderPassRecord {
    /// A command buffer's currently recorded subpass index must always
    /// resolve to a descriptor of its active render pass.
    pub fn subpass(&self, index: u32) -> Option<&SubpassDescriptor> {
        self.subpasses.get(index as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

/// Vulkan command-buffer lifecycle state (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Pending,
    Invalid,
}

#[derive(Debug, Clone, Copy, Default)]
struct ActiveRenderPass {
    render_pass: Option<ArenaIndex>,
    subpass_index: u32,
    contents: Option<SubpassContents>,
}

/// Bound-pipeline slot per bind point, tracked per the *recorded sequence*
/// rather than resolved eagerly — see [`crate::command::command::CommandKind::BindPipeline`].
#[derive(Debug, Clone, Copy, Default)]
struct BoundPipelines {
    graphics: Option<(ArenaIndex, PipelineFingerprint)>,
    compute: Option<(ArenaIndex, PipelineFingerprint)>,
    ray_tracing: Option<(ArenaIndex, PipelineFingerprint)>,
}

impl BoundPipelines {
    fn slot_mut(&mut self, bind_point: BindPoint) -> &mut Option<(ArenaIndex, PipelineFingerprint)> {
        match bind_point {
            BindPoint::Graphics => &mut self.graphics,
            BindPoint::Compute => &mut self.compute,
            BindPoint::RayTracing => &mut self.ray_tracing,
        }
    }
}

/// Everything recorded for one command buffer. Owns its C2 timestamp pool;
/// mutated only while in `Recording` state, by the single thread that
/// issued `begin`.
pub struct CommandBufferRecord {
    pub handle: vk::CommandBuffer,
    pub level: CommandBufferLevel,
    pub queue_family: u32,
    pub state: CommandBufferState,
    pub commands: Vec<Command>,
    bound: BoundPipelines,
    active_render_pass: ActiveRenderPass,
    pub timestamp_pool: TimestampQueryPool,
    /// Set when a query pool could not be grown; subsequent commands in this
    /// record carry no timestamps, but the underlying Vulkan calls are still
    /// forwarded unchanged.
    pub degraded: bool,
    /// The fence covering the in-flight submission this record is part of,
    /// set when it transitions to `Pending`. Lets a late free/pool-reset
    /// find the right submit batch to detach into (spec.md §4.5).
    pub owning_fence: Option<vk::Fence>,
}

impl CommandBufferRecord {
    pub fn new(
        handle: vk::CommandBuffer,
        level: CommandBufferLevel,
        queue_family: u32,
        timestamp_pool: TimestampQueryPool,
    ) -> Self {
        Self {
            handle,
            level,
            queue_family,
            state: CommandBufferState::Initial,
            commands: Vec::new(),
            bound: BoundPipelines::default(),
            active_render_pass: ActiveRenderPass::default(),
            timestamp_pool,
            degraded: false,
            owning_fence: None,
        }
    }

    pub fn bound_pipeline(&self, bind_point: BindPoint) -> Option<(ArenaIndex, PipelineFingerprint)> {
        match bind_point {
            BindPoint::Graphics => self.bound.graphics,
            BindPoint::Compute => self.bound.compute,
            BindPoint::RayTracing => self.bound.ray_tracing,
        }
    }

    pub fn bind_pipeline(&mut self, bind_point: BindPoint, pipeline: ArenaIndex, fingerprint: PipelineFingerprint) {
        *self.bound.slot_mut(bind_point) = Some((pipeline, fingerprint));
    }

    pub fn begin_render_pass(&mut self, render_pass: ArenaIndex, contents: SubpassContents) {
        self.active_render_pass = ActiveRenderPass {
            render_pass: Some(render_pass),
            subpass_index: 0,
            contents: Some(contents),
        };
    }

    pub fn next_subpass(&mut self, contents: SubpassContents) {
        self.active_render_pass.subpass_index += 1;
        self.active_render_pass.contents = Some(contents);
    }

    pub fn end_render_pass(&mut self) {
        self.active_render_pass = ActiveRenderPass::default();
    }

    pub fn active_render_pass(&self) -> Option<(ArenaIndex, u32, SubpassContents)> {
        let rp = self.active_render_pass.render_pass?;
        let contents = self.active_render_pass.contents?;
        Some((rp, self.active_render_pass.subpass_index, contents))
    }

    /// Discards all queries and commands, used on `begin` (re-record) or an
    /// explicit reset.
    pub fn clear_for_reset(&mut self) {
        self.commands.clear();
        self.bound = BoundPipelines::default();
        self.active_render_pass = ActiveRenderPass::default();
        self.degraded = false;
    }

    pub fn first_begin_tick_source(&self) -> Option<u64> {
        self.commands.iter().find_map(|c| c.timestamps.begin)
    }

    pub fn last_end_tick_source(&self) -> Option<u64> {
        self.commands.iter().rev().find_map(|c| c.timestamps.end)
    }
}

impl std::fmt::Debug for CommandBufferRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBufferRecord")
            .field("handle", &self.handle)
            .field("level", &self.level)
            .field("queue_family", &self.queue_family)
            .field("state", &self.state)
            .field("commands", &self.commands.len())
            .field("degraded", &self.degraded)
            .finish()
    }
}
