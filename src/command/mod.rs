//! Command recorder (C4): the per-command-buffer state machine, pipeline
//! attribution, and timestamp wrapping at the heart of the profiler.

pub mod command;
pub mod record;
pub mod recorder;
pub mod state_machine;

pub use command::{BindPoint, Command, CommandKind, PipelineFingerprint, SubpassContents, TimestampRange};
pub use record::{
    CommandBufferLevel, CommandBufferRecord, CommandBufferState, PipelineKind, PipelineRecord, RenderPassRecord,
    SubpassDescriptor,
};
pub use recorder::CommandRecorder;
