//! The tagged-sum `Command` type recorded for every intercepted call.
//!
//! The original source dispatches on command kind through virtual calls;
//! here a single enum plus a tree visitor (see [`crate::aggregate::tree`])
//! replaces that hierarchy. Every variant carries the call-site parameters
//! a report needs and the begin/end timestamp indices the recorder wrote.

use crate::arena::ArenaIndex;

/// Graphics, compute or ray-tracing bind point. Each bind point has its own
/// independent bound-pipeline slot per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPoint {
    Graphics,
    Compute,
    RayTracing,
}

/// Whether a subpass's commands are recorded inline or composed from
/// executed secondary command buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpassContents {
    Inline,
    SecondaryCommandBuffers,
}

/// Identifies a bound pipeline at the point a command referencing it was
/// recorded. The fingerprint is a content hash of the pipeline's shader
/// stages plus fixed-function state, computed once at pipeline creation and
/// never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineFingerprint(pub u64);

/// A pair of timestamp-query absolute indices bracketing one command. `None`
/// means the recorder was degraded when this command was recorded and no
/// timing is available for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampRange {
    pub begin: Option<u64>,
    pub end: Option<u64>,
}

impl TimestampRange {
    pub fn is_resolved(&self) -> bool {
        self.begin.is_some() && self.end.is_some()
    }
}

/// Call-site parameters specific to one command kind. Kept deliberately
/// thin: just enough to label a report node, never enough to replay the
/// call (replay is an explicit non-goal).
#[derive(Debug, Clone)]
pub enum CommandKind {
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    DrawIndirect {
        draw_count: u32,
    },
    Dispatch {
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    },
    DispatchIndirect,
    Copy,
    Clear,
    ResolveOrBlit,
    FillOrUpdateBuffer,
    TraceRays {
        width: u32,
        height: u32,
        depth: u32,
    },
    BuildAccelerationStructure {
        geometry_count: u32,
    },
    BindPipeline {
        bind_point: BindPoint,
        pipeline: ArenaIndex,
        fingerprint: PipelineFingerprint,
    },
    BeginRenderPass {
        render_pass: ArenaIndex,
        subpass_count: u32,
    },
    NextSubpass {
        subpass_index: u32,
        contents: SubpassContents,
    },
    EndRenderPass,
    /// References secondary command-buffer records by arena index. The
    /// aggregator recurses into each one rather than flattening them here.
    ExecuteCommands {
        secondaries: Vec<ArenaIndex>,
    },
    DebugLabel {
        name: String,
    },
}

impl CommandKind {
    /// The pipeline stage a begin-timestamp should be written at for this
    /// command's class: top-of-pipe for draws/dispatches/traces, bottom-of-
    /// pipe for commands whose cost is dominated by whole-pass completion.
    pub fn begin_stage(&self) -> crate::query::PipelineStage {
        use ash::vk;
        match self {
            CommandKind::Draw { .. }
            | CommandKind::DrawIndexed { .. }
            | CommandKind::DrawIndirect { .. }
            | CommandKind::Dispatch { .. }
            | CommandKind::DispatchIndirect
            | CommandKind::TraceRays { .. }
            | CommandKind::BuildAccelerationStructure { .. } => vk::PipelineStageFlags2::TOP_OF_PIPE,
            _ => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        }
    }

    pub fn end_stage(&self) -> crate::query::PipelineStage {
        ash::vk::PipelineStageFlags2::BOTTOM_OF_PIPE
    }
}

/// One recorded command: its kind plus the timestamp bracket the recorder
/// wrote around it. Render-pass begin/end additionally carry a segment
/// bracket measuring just the driver-side begin/end overhead, reported
/// separately in C6/C7 as `beginDuration`/`endDuration`.
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub timestamps: TimestampRange,
    pub segment: Option<TimestampRange>,
}

impl Command {
    pub fn new(kind: CommandKind, timestamps: TimestampRange) -> Self {
        Self {
            kind,
            timestamps,
            segment: None,
        }
    }

    pub fn with_segment(mut self, segment: TimestampRange) -> Self {
        self.segment = Some(segment);
        self
    }
}
