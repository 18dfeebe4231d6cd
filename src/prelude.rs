//! Re-exports the types most consumers reach for.

pub use ash::vk;

pub use traits::*;

pub use crate::aggregate::{CounterReport, FrameData, FrameDelimiter, RegionKind, RegionNode, RegionProperties};
pub use crate::arena::{Arena, ArenaIndex};
pub use crate::command::{
    BindPoint, Command, CommandBufferLevel, CommandBufferRecord, CommandBufferState, CommandKind, CommandRecorder,
    PipelineFingerprint, PipelineKind, PipelineRecord, RenderPassRecord, SubpassContents, SubpassDescriptor,
    TimestampRange,
};
pub use crate::config::{FrameDelimiterMode, ProfilerConfig, SamplingMode, SyncMode};
pub use crate::core::device::Device;
pub use crate::core::dispatch::{DispatchKey, DispatchRegistry};
pub use crate::core::error::ProfilerError;
pub use crate::debug_names::DebugNameRegistry;
pub use crate::device_profiler::DeviceProfiler;
pub use crate::memory::{AllocationEvent, AllocationEventKind, AllocationScope, MemoryProfiler};
pub use crate::query::{
    AggregationRule, CounterDescription, CounterStorage, CounterUnit, CounterValue, MetricsSet, TimestampQueryPool,
};

/// Re-exports the traits most consumers need in scope.
pub mod traits {
    pub use crate::extension::ProfilerExtension;
    pub use crate::query::PerformanceCounters;
}
