//! GPU query machinery: timestamp pools (C2) and the performance-counter
//! provider capability (C3).

pub mod counters;
pub mod timestamp;

pub use counters::{
    AggregationRule, CounterDescription, CounterStorage, CounterUnit, CounterValue, MetricsSet, NullCounters,
    PerformanceCounters,
};
pub use timestamp::{PipelineStage, TimestampQueryPool, TimestampWriter, DEFAULT_POOL_SIZE};
