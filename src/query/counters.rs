//! Performance-counter provider (C3): a capability polymorphic over
//! {none, KHR_performance_query, vendor MDAPI}.
//!
//! Only the `none` backend ([`NullCounters`]) is implemented here — vendor
//! backends are loaded through [`crate::extension`] as optional plugins.
//! This module fixes the trait every backend implements and the
//! unit-driven aggregation rule consumed by [`crate::aggregate`].

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::core::error::ProfilerError;

/// Distinguishes how a counter's per-command-buffer values are combined into
/// a frame-level value in the aggregator (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationRule {
    /// bytes, cycles, nanoseconds, generic — weighted sum, weight = command-buffer duration.
    Extensive,
    /// Hz, %, °K, W, V, A, B/s — duration-weighted average.
    Intensive,
}

/// Physical unit a counter is reported in. Determines its [`AggregationRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUnit {
    Generic,
    Bytes,
    Cycles,
    Nanoseconds,
    Hertz,
    Percent,
    Kelvin,
    Watts,
    Volts,
    Amps,
    BytesPerSecond,
}

impl CounterUnit {
    pub fn aggregation_rule(self) -> AggregationRule {
        match self {
            CounterUnit::Generic | CounterUnit::Bytes | CounterUnit::Cycles | CounterUnit::Nanoseconds => {
                AggregationRule::Extensive
            }
            CounterUnit::Hertz
            | CounterUnit::Percent
            | CounterUnit::Kelvin
            | CounterUnit::Watts
            | CounterUnit::Volts
            | CounterUnit::Amps
            | CounterUnit::BytesPerSecond => AggregationRule::Intensive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterStorage {
    Int64,
    Uint64,
    Float32,
    Float64,
}

/// Describes a single counter within a metrics set, canonical across queue
/// families once deduplicated by `initialize`.
#[derive(Debug, Clone)]
pub struct CounterDescription {
    pub uuid: [u8; 16],
    pub name: String,
    pub unit: CounterUnit,
    pub storage: CounterStorage,
}

#[derive(Debug, Clone)]
pub struct MetricsSet {
    pub name: String,
    pub counters: Vec<CounterDescription>,
}

/// A resolved counter value in canonical order, ready for aggregation.
#[derive(Debug, Clone, Copy)]
pub enum CounterValue {
    Int64(i64),
    Uint64(u64),
    Float64(f64),
}

impl CounterValue {
    pub fn as_f64(self) -> f64 {
        match self {
            CounterValue::Int64(v) => v as f64,
            CounterValue::Uint64(v) => v as f64,
            CounterValue::Float64(v) => v,
        }
    }
}

/// Capability surface a counter backend implements. `initialize` is called
/// once per device; everything else may be called repeatedly across the
/// device's lifetime.
pub trait PerformanceCounters: Send + Sync {
    fn initialize(&mut self, queue_families: &[u32]) -> Result<(), ProfilerError>;

    fn metrics_sets(&self) -> &[MetricsSet];

    fn metrics_properties(&self, set: usize) -> Option<&MetricsSet> {
        self.metrics_sets().get(set)
    }

    fn set_active_metrics_set(&mut self, index: usize) -> Result<(), ProfilerError>;

    fn active_metrics_set(&self) -> usize;

    /// Whether an already-allocated query pool remains valid after
    /// `set_active_metrics_set` changes the active set. If `false`, the
    /// command recorder must detect a stale pool and reallocate before the
    /// next recording.
    fn supports_query_pool_reuse(&self) -> bool;

    /// Byte size of one counter-query result for `queue_family` under the
    /// active set.
    fn query_data_size(&self, queue_family: u32) -> usize;

    /// Registers a named custom set scoped to `queue_family`. Fails with
    /// [`ProfilerError::Unsatisfiable`] if the requested counters cannot be
    /// sampled in a single hardware pass. Implementations must dedupe by a
    /// hash of (queue family, counter UUID set) so repeated requests for an
    /// identical set return the same index.
    fn create_custom_metrics_set(
        &mut self,
        queue_family: u32,
        name: &str,
        counters: &[[u8; 16]],
    ) -> Result<usize, ProfilerError>;

    /// Maps a queue family's raw result layout back to the canonical counter
    /// order, zero-filling counters absent from that family.
    fn parse_report(&self, set: usize, queue_family: u32, bytes: &[u8]) -> Result<Vec<CounterValue>, ProfilerError>;
}

/// Computes the number of hardware passes `counters` would require under a
/// backend that can sample at most `max_per_pass` counters concurrently.
/// Pulled out as a free function so it is exercised without a real backend;
/// every real implementation of `create_custom_metrics_set` should route
/// through it (or an equivalent vendor-specific cost model) before
/// committing to a set.
pub fn num_passes_required(counter_count: usize, max_per_pass: usize) -> usize {
    if max_per_pass == 0 {
        return usize::MAX;
    }
    counter_count.div_ceil(max_per_pass)
}

fn hash_custom_set(queue_family: u32, counters: &[[u8; 16]]) -> u64 {
    let mut sorted = counters.to_vec();
    sorted.sort_unstable();
    let mut hasher = DefaultHasher::new();
    queue_family.hash(&mut hasher);
    sorted.hash(&mut hasher);
    hasher.finish()
}

/// The `none` backend: reports no counter sets and no counters. Used when no
/// performance-query extension or vendor backend is available; every query
/// that would otherwise report a counter is simply absent.
#[derive(Debug, Default)]
pub struct NullCounters {
    custom_sets: HashMap<u64, usize>,
}

impl PerformanceCounters for NullCounters {
    fn initialize(&mut self, _queue_families: &[u32]) -> Result<(), ProfilerError> {
        Ok(())
    }

    fn metrics_sets(&self) -> &[MetricsSet] {
        &[]
    }

    fn set_active_metrics_set(&mut self, index: usize) -> Result<(), ProfilerError> {
        Err(ProfilerError::ValidationFailed(format!(
            "no metrics sets available, requested index {index}"
        )))
    }

    fn active_metrics_set(&self) -> usize {
        0
    }

    fn supports_query_pool_reuse(&self) -> bool {
        true
    }

    fn query_data_size(&self, _queue_family: u32) -> usize {
        0
    }

    fn create_custom_metrics_set(
        &mut self,
        queue_family: u32,
        _name: &str,
        counters: &[[u8; 16]],
    ) -> Result<usize, ProfilerError> {
        if counters.is_empty() {
            return Err(ProfilerError::Unsatisfiable("empty counter set".into()));
        }
        let key = hash_custom_set(queue_family, counters);
        if let Some(index) = self.custom_sets.get(&key) {
            return Ok(*index);
        }
        Err(ProfilerError::Unsatisfiable(
            "no performance-counter backend loaded".into(),
        ))
    }

    fn parse_report(&self, _set: usize, _queue_family: u32, _bytes: &[u8]) -> Result<Vec<CounterValue>, ProfilerError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensive_units_sum_intensive_units_average() {
        assert_eq!(CounterUnit::Bytes.aggregation_rule(), AggregationRule::Extensive);
        assert_eq!(CounterUnit::Nanoseconds.aggregation_rule(), AggregationRule::Extensive);
        assert_eq!(CounterUnit::Hertz.aggregation_rule(), AggregationRule::Intensive);
        assert_eq!(CounterUnit::Percent.aggregation_rule(), AggregationRule::Intensive);
    }

    #[test]
    fn num_passes_required_rounds_up() {
        assert_eq!(num_passes_required(8, 4), 2);
        assert_eq!(num_passes_required(9, 4), 3);
        assert_eq!(num_passes_required(0, 4), 0);
        assert_eq!(num_passes_required(4, 0), usize::MAX);
    }

    #[test]
    fn custom_set_hash_is_order_independent() {
        let a = [[1u8; 16], [2u8; 16]];
        let b = [[2u8; 16], [1u8; 16]];
        assert_eq!(hash_custom_set(0, &a), hash_custom_set(0, &b));
        assert_ne!(hash_custom_set(0, &a), hash_custom_set(1, &a));
    }

    #[test]
    fn null_backend_rejects_custom_sets_as_unsatisfiable() {
        let mut backend = NullCounters::default();
        let err = backend
            .create_custom_metrics_set(0, "custom", &[[1u8; 16]])
            .unwrap_err();
        assert!(matches!(err, ProfilerError::Unsatisfiable(_)));
    }

    #[test]
    fn null_backend_rejects_empty_counter_set() {
        let mut backend = NullCounters::default();
        let err = backend.create_custom_metrics_set(0, "custom", &[]).unwrap_err();
        assert!(matches!(err, ProfilerError::Unsatisfiable(_)));
    }
}
