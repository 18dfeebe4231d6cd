//! Result resolver (C6): turns a fully-signaled [`crate::submit::tracker::SubmitBatch`]
//! into resolved durations, by pulling raw timestamp ticks out of each
//! command buffer's C2 pool and (optionally) parsing counter reports
//! through C3.

use crate::command::{Command, CommandBufferRecord, TimestampRange};
use crate::core::device::Device;
use crate::core::error::ProfilerError;
use crate::query::counters::{CounterValue, PerformanceCounters};

/// Masks off the upper `64 - valid_bits` bits of a raw timestamp, matching
/// `VkQueueFamilyProperties::timestampValidBits`.
pub fn mask_timestamp(raw: u64, valid_bits: u32) -> u64 {
    if valid_bits >= 64 {
        raw
    } else {
        raw & ((1u64 << valid_bits) - 1)
    }
}

/// Ticks elapsed between `begin` and `end`, both already masked to
/// `valid_bits`. If the hardware counter wrapped between the two writes
/// (`end < begin`), treats `end` as `end + 2^valid_bits`.
pub fn wrap_corrected_delta_ticks(begin: u64, end: u64, valid_bits: u32) -> u64 {
    if end >= begin {
        end - begin
    } else {
        let wrap = if valid_bits >= 64 { u64::MAX } else { 1u64 << valid_bits };
        (end.wrapping_add(wrap)).wrapping_sub(begin)
    }
}

/// One resolved command: its kind-carrying source plus a nanosecond
/// duration, or `None` if either timestamp index was unresolved (a
/// degraded recording).
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub source: Command,
    pub duration_ns: Option<f64>,
    pub segment_duration_ns: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedCommandBuffer {
    pub queue_family: u32,
    pub commands: Vec<ResolvedCommand>,
    pub duration_ns: Option<f64>,
    pub degraded: bool,
    pub counters: Option<Vec<CounterValue>>,
}

fn duration_of(range: TimestampRange, ticks: &[u64], valid_bits: u32, period_ns: f32) -> Option<f64> {
    let begin = range.begin?;
    let end = range.end?;
    let begin_raw = *ticks.get(begin as usize)?;
    let end_raw = *ticks.get(end as usize)?;
    let begin_masked = mask_timestamp(begin_raw, valid_bits);
    let end_masked = mask_timestamp(end_raw, valid_bits);
    let delta = wrap_corrected_delta_ticks(begin_masked, end_masked, valid_bits);
    Some(delta as f64 * period_ns as f64)
}

/// Resolves one command buffer's timestamps and, if a counter pool is
/// attached, its counter report. `counter_report` is the raw per-queue-
/// family byte buffer already read back from the counter query pool, if
/// any.
pub fn resolve_command_buffer(
    device: &Device,
    record: &CommandBufferRecord,
    counters: Option<(&dyn PerformanceCounters, usize, &[u8])>,
) -> Result<ResolvedCommandBuffer, ProfilerError> {
    let valid_bits = device.timestamp_valid_bits(record.queue_family);
    let period_ns = device.timestamp_period_ns();

    let mut ticks = Vec::new();
    if !record.degraded {
        record.timestamp_pool.write_results(&mut ticks)?;
    }

    let resolved_commands: Vec<ResolvedCommand> = record
        .commands
        .iter()
        .map(|command| {
            let duration_ns = if record.degraded {
                None
            } else {
                duration_of(command.timestamps, &ticks, valid_bits, period_ns)
            };
            let segment_duration_ns = if record.degraded {
                None
            } else {
                command
                    .segment
                    .and_then(|segment| duration_of(segment, &ticks, valid_bits, period_ns))
            };
            ResolvedCommand {
                source: command.clone(),
                duration_ns,
                segment_duration_ns,
            }
        })
        .collect();

    let duration_ns = if record.degraded {
        None
    } else {
        let first_begin = record.first_begin_tick_source();
        let last_end = record.last_end_tick_source();
        match (first_begin, last_end) {
            (Some(begin), Some(end)) => duration_of(
                TimestampRange {
                    begin: Some(begin),
                    end: Some(end),
                },
                &ticks,
                valid_bits,
                period_ns,
            ),
            _ => None,
        }
    };

    let counter_values = match counters {
        Some((backend, set, bytes)) => Some(backend.parse_report(set, record.queue_family, bytes)?),
        None => None,
    };

    Ok(ResolvedCommandBuffer {
        queue_family: record.queue_family,
        commands: resolved_commands,
        duration_ns,
        degraded: record.degraded,
        counters: counter_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_timestamp_clears_bits_above_valid_bits() {
        assert_eq!(mask_timestamp(0b1111, 2), 0b11);
        assert_eq!(mask_timestamp(u64::MAX, 64), u64::MAX);
        assert_eq!(mask_timestamp(0xFFFF_FFFF_FFFF_FFFF, 0), 0);
    }

    #[test]
    fn wrap_corrected_delta_is_plain_subtraction_when_no_wrap() {
        assert_eq!(wrap_corrected_delta_ticks(100, 150, 32), 50);
    }

    #[test]
    fn wrap_corrected_delta_handles_counter_wraparound() {
        let valid_bits = 8u32;
        let max = (1u64 << valid_bits) - 1;
        // begin near the top of the range, end wrapped back to near zero.
        let begin = max - 2;
        let end = 3;
        let expected = (max + 1) - begin + end;
        assert_eq!(wrap_corrected_delta_ticks(begin, end, valid_bits), expected);
    }

    #[test]
    fn duration_of_is_none_when_either_index_unresolved() {
        let ticks = vec![10, 20, 30];
        assert!(duration_of(TimestampRange { begin: None, end: Some(1) }, &ticks, 64, 1.0).is_none());
        assert!(duration_of(TimestampRange { begin: Some(0), end: None }, &ticks, 64, 1.0).is_none());
    }

    #[test]
    fn duration_of_scales_by_timestamp_period() {
        let ticks = vec![100, 250];
        let range = TimestampRange {
            begin: Some(0),
            end: Some(1),
        };
        let duration = duration_of(range, &ticks, 64, 2.0).unwrap();
        assert_eq!(duration, 300.0);
    }
}
