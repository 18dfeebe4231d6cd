//! Frame aggregator (C7): accumulates resolved submit batches between two
//! frame-delimiter events and publishes an immutable [`FrameData`] snapshot.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::aggregate::tree::{build_command_buffer_tree, PipelineVisitor, RegionKind, RegionNode, RegionProperties};
use crate::arena::{Arena, ArenaIndex};
use crate::command::{PipelineFingerprint, PipelineRecord, RenderPassRecord};
use crate::core::error::ProfilerError;
use crate::query::counters::{AggregationRule, CounterUnit, CounterValue};
use crate::submit::resolver::ResolvedCommandBuffer;

/// One event that closes out the current frame: either a `present` call or
/// the Nth submit, per the configured delimiter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDelimiter {
    Present,
    EveryNSubmits(u32),
}

/// A primary command buffer's resolved result plus every secondary it
/// (transitively) references, keyed by arena index so `execute-commands`
/// can be recursed into while building the tree.
pub struct ResolvedSubmission {
    pub queue_family: u32,
    pub primary: ResolvedCommandBuffer,
    pub secondaries: HashMap<ArenaIndex, ResolvedCommandBuffer>,
}

#[derive(Debug, Clone)]
pub struct CounterReport {
    pub name: String,
    pub unit: CounterUnit,
    pub value: CounterValue,
}

/// Immutable per-frame snapshot. Consumers take a shared lock on the
/// publishing [`FrameAggregator`] only for the duration of cloning an
/// `Arc`/copy of this — never while walking it.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub index: u64,
    pub root: RegionNode,
    pub top_pipelines: Vec<(PipelineFingerprint, Option<String>, f64)>,
    pub counters: Vec<CounterReport>,
}

fn weighted_counter_aggregate(samples: &[(f64, f64, CounterUnit)]) -> Option<(CounterValue, CounterUnit)> {
    let unit = samples.first()?.2;
    match unit.aggregation_rule() {
        AggregationRule::Extensive => {
            // Weighted sum: doubling every duration doubles the result.
            let sum: f64 = samples.iter().map(|(value, weight, _)| value * weight).sum();
            Some((CounterValue::Float64(sum), unit))
        }
        AggregationRule::Intensive => {
            let weighted: f64 = samples.iter().map(|(value, weight, _)| value * weight).sum();
            let total_weight: f64 = samples.iter().map(|(_, weight, _)| weight).sum();
            if total_weight == 0.0 {
                return Some((CounterValue::Float64(0.0), unit));
            }
            Some((CounterValue::Float64(weighted / total_weight), unit))
        }
    }
}

/// Builds one frame's [`FrameData`] from every submission resolved since
/// the previous delimiter. Always returns a frame — an empty `submissions`
/// slice produces a frame with an empty root and no top pipelines, rather
/// than failing, so a `flush` with no pending work is never an error.
pub fn build_frame(
    index: u64,
    submissions: Vec<ResolvedSubmission>,
    pipelines: &Arena<PipelineRecord>,
    render_passes: &Arena<RenderPassRecord>,
    counter_descriptions: &[(String, CounterUnit)],
) -> FrameData {
    let mut visitor = PipelineVisitor::new();
    let mut submit_batch_children = Vec::new();
    let mut counter_samples: HashMap<String, Vec<(f64, f64, CounterUnit)>> = HashMap::new();

    for submission in &submissions {
        let duration_weight = submission.primary.duration_ns.unwrap_or(0.0);
        if let Some(values) = &submission.primary.counters {
            for (i, value) in values.iter().enumerate() {
                if let Some((name, unit)) = counter_descriptions.get(i) {
                    counter_samples
                        .entry(name.clone())
                        .or_default()
                        .push((value.as_f64(), duration_weight, *unit));
                }
            }
        }

        let cb_node = build_command_buffer_tree(
            &submission.primary,
            pipelines,
            render_passes,
            &submission.secondaries,
            &mut visitor,
        );

        let submit_info_node = RegionNode {
            kind: RegionKind::SubmitInfo,
            properties: RegionProperties::SubmitInfo,
            duration_ms: cb_node.duration_ms,
            unresolved: cb_node.unresolved,
            begin_duration_ms: None,
            end_duration_ms: None,
            children: vec![cb_node],
        };

        submit_batch_children.push(RegionNode {
            kind: RegionKind::SubmitBatch,
            properties: RegionProperties::SubmitBatch {
                queue_family: submission.queue_family,
            },
            duration_ms: submit_info_node.duration_ms,
            unresolved: submit_info_node.unresolved,
            begin_duration_ms: None,
            end_duration_ms: None,
            children: vec![submit_info_node],
        });
    }

    let frame_duration_ms = submit_batch_children.iter().map(|c| c.duration_ms).fold(0.0, f64::max);
    let root = RegionNode {
        kind: RegionKind::Frame,
        properties: RegionProperties::Frame { index },
        duration_ms: frame_duration_ms,
        unresolved: submit_batch_children.iter().any(|c| c.unresolved),
        begin_duration_ms: None,
        end_duration_ms: None,
        children: submit_batch_children,
    };

    let counters = counter_samples
        .into_iter()
        .filter_map(|(name, samples)| {
            weighted_counter_aggregate(&samples).map(|(value, unit)| CounterReport { name, unit, value })
        })
        .collect();

    FrameData {
        index,
        root,
        top_pipelines: visitor.into_ranked(),
        counters,
    }
}

/// Holds the latest published [`FrameData`] and the running submission
/// buffer for the frame currently being accumulated.
#[derive(Default)]
pub struct FrameAggregator {
    latest: RwLock<Option<FrameData>>,
    next_index: std::sync::atomic::AtomicU64,
}

impl FrameAggregator {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(None),
            next_index: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Publishes `frame`, replacing whatever snapshot was visible before.
    /// Per spec.md §5, a `FrameData` with index N becomes visible only
    /// after every frame < N — callers must invoke this in frame order,
    /// which holds because delimiters are processed on a single worker.
    pub fn publish(&self, frame: FrameData) {
        *self.latest.write().unwrap() = Some(frame);
    }

    /// Returns a clone of the latest snapshot, or `not-ready` if no frame
    /// has been delimited yet.
    pub fn get_frame_data(&self) -> Result<FrameData, ProfilerError> {
        self.latest.read().unwrap().clone().ok_or(ProfilerError::NotReady)
    }

    pub fn allocate_frame_index(&self) -> u64 {
        self.next_index.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_frame_with_no_submissions_still_returns_a_frame() {
        let pipelines = Arena::new();
        let render_passes = Arena::new();
        let frame = build_frame(0, Vec::new(), &pipelines, &render_passes, &[]);
        assert_eq!(frame.index, 0);
        assert!(frame.root.children.is_empty());
        assert!(frame.top_pipelines.is_empty());
    }

    #[test]
    fn extensive_counter_aggregation_is_scale_invariant_under_duration_doubling() {
        let samples = vec![(10.0, 2.0, CounterUnit::Bytes), (20.0, 3.0, CounterUnit::Bytes)];
        let doubled: Vec<_> = samples.iter().map(|(v, w, u)| (*v, w * 2.0, *u)).collect();

        let (base, _) = weighted_counter_aggregate(&samples).unwrap();
        let (scaled, _) = weighted_counter_aggregate(&doubled).unwrap();

        match (base, scaled) {
            (CounterValue::Float64(b), CounterValue::Float64(s)) => assert!((s - b * 2.0).abs() < 1e-9),
            _ => panic!("expected float counters"),
        }
    }

    #[test]
    fn intensive_counter_aggregation_is_unchanged_under_uniform_duration_scaling() {
        let samples = vec![(10.0, 2.0, CounterUnit::Hertz), (20.0, 3.0, CounterUnit::Hertz)];
        let scaled: Vec<_> = samples.iter().map(|(v, w, u)| (*v, w * 5.0, *u)).collect();

        let (base, _) = weighted_counter_aggregate(&samples).unwrap();
        let (after, _) = weighted_counter_aggregate(&scaled).unwrap();

        match (base, after) {
            (CounterValue::Float64(b), CounterValue::Float64(a)) => assert!((a - b).abs() < 1e-9),
            _ => panic!("expected float counters"),
        }
    }

    #[test]
    fn frame_aggregator_reports_not_ready_before_first_publish() {
        let aggregator = FrameAggregator::new();
        assert!(matches!(aggregator.get_frame_data(), Err(ProfilerError::NotReady)));
    }

    #[test]
    fn frame_aggregator_returns_published_frame() {
        let aggregator = FrameAggregator::new();
        let pipelines = Arena::new();
        let render_passes = Arena::new();
        let frame = build_frame(3, Vec::new(), &pipelines, &render_passes, &[]);
        aggregator.publish(frame);
        assert_eq!(aggregator.get_frame_data().unwrap().index, 3);
    }
}
