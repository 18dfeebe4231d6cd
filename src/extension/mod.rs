//! Extension surface (C10): the stable ABI described in spec.md §6, opaque
//! version 5. A thin translation over [`crate::device_profiler::DeviceProfiler`] —
//! it must never hold the aggregator locked longer than copying the latest
//! [`FrameData`] snapshot.

use crate::aggregate::FrameData;
use crate::config::{FrameDelimiterMode, SamplingMode};
use crate::core::error::ProfilerError;
use crate::device_profiler::DeviceProfiler;
use crate::query::counters::{CounterDescription, MetricsSet};

pub const EXT_PROFILER_SPEC_VERSION: u32 = 5;
pub const EXT_PROFILER_EXTENSION_NAME: &str = "EXT_profiler";

#[derive(Debug, Clone)]
pub struct MetricsSetSummary {
    pub name: String,
    pub metrics_count: usize,
}

#[derive(Debug, Clone)]
pub struct MetricProperties {
    pub short_name: String,
    pub unit: crate::query::counters::CounterUnit,
    pub storage: crate::query::counters::CounterStorage,
    pub uuid: [u8; 16],
}

/// The semantic operations of the `EXT_profiler` device extension table.
/// Implemented once, against a [`DeviceProfiler`]; the actual `GetProcAddr`
/// plumbing that exposes these as a Vulkan extension is out of scope (see
/// spec.md §1).
pub trait ProfilerExtension {
    fn set_sampling_mode(&self, mode: SamplingMode) -> Result<(), ProfilerError>;
    fn set_frame_delimiter(&self, mode: FrameDelimiterMode, n: u32) -> Result<(), ProfilerError>;
    fn get_frame_data(&self) -> Result<FrameData, ProfilerError>;
    fn flush(&self);
    fn enumerate_metrics_sets(&self) -> Vec<MetricsSetSummary>;
    fn set_active_metrics_set(&self, index: usize) -> Result<(), ProfilerError>;
    fn enumerate_metrics(&self, set: usize) -> Result<Vec<MetricProperties>, ProfilerError>;
}

impl ProfilerExtension for DeviceProfiler {
    fn set_sampling_mode(&self, mode: SamplingMode) -> Result<(), ProfilerError> {
        // Sampling mode only changes what the recorder chooses to wrap with
        // timestamps going forward; already-recorded command buffers are
        // unaffected, matching the create-path rollback-free contract.
        DeviceProfiler::set_sampling_mode(self, mode);
        Ok(())
    }

    fn set_frame_delimiter(&self, mode: FrameDelimiterMode, n: u32) -> Result<(), ProfilerError> {
        if mode == FrameDelimiterMode::EveryNSubmits && n == 0 {
            return Err(ProfilerError::ValidationFailed("frame delimiter N must be >= 1".into()));
        }
        DeviceProfiler::set_frame_delimiter(self, mode, n);
        Ok(())
    }

    fn get_frame_data(&self) -> Result<FrameData, ProfilerError> {
        DeviceProfiler::get_frame_data(self)
    }

    fn flush(&self) {
        DeviceProfiler::flush(self)
    }

    fn enumerate_metrics_sets(&self) -> Vec<MetricsSetSummary> {
        self.metrics_sets().iter().map(summarize).collect()
    }

    fn set_active_metrics_set(&self, index: usize) -> Result<(), ProfilerError> {
        DeviceProfiler::set_active_metrics_set(self, index)
    }

    fn enumerate_metrics(&self, set: usize) -> Result<Vec<MetricProperties>, ProfilerError> {
        let set = self
            .metrics_properties(set)
            .ok_or_else(|| ProfilerError::ValidationFailed(format!("no metrics set at index {set}")))?;
        Ok(set.counters.iter().map(describe).collect())
    }
}

fn summarize(set: &MetricsSet) -> MetricsSetSummary {
    MetricsSetSummary {
        name: set.name.clone(),
        metrics_count: set.counters.len(),
    }
}

fn describe(description: &CounterDescription) -> MetricProperties {
    MetricProperties {
        short_name: description.name.clone(),
        unit: description.unit,
        storage: description.storage,
        uuid: description.uuid,
    }
}
