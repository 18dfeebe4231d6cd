//! Per-command-buffer growing ring of GPU timestamp queries (C2).
//!
//! Holds an ordered sequence of fixed-size hardware `VkQueryPool`s plus
//! three cursors: `current_pool`, `current_slot_in_pool`, `absolute_index`.
//! The absolute index is monotonic for the lifetime of a command-buffer
//! record between resets and is what [`crate::command::record::Command`]
//! stores as its begin/end timestamp index.
//!
//! The cursor arithmetic is pulled out into [`PoolCursor`], a plain struct
//! with no Vulkan dependency, so the growth/rollover logic can be unit
//! tested without a real device.

use ash::vk;

use crate::core::error::ProfilerError;
use crate::core::Device;

/// Default number of timestamp slots per hardware pool. Matches spec.md §4.2.
pub const DEFAULT_POOL_SIZE: u32 = 32_768;

/// Utilization threshold at which [`TimestampQueryPool::preallocate`] grows
/// the ring by appending a fresh pool.
const GROWTH_THRESHOLD: f32 = 0.8;

pub type PipelineStage = vk::PipelineStageFlags2;

/// Pure cursor arithmetic for the timestamp query ring: which pool is
/// active, which slot within it, and the absolute index across the whole
/// command-buffer lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PoolCursor {
    pub current_pool: usize,
    pub current_slot_in_pool: u32,
    pub absolute_index: u64,
}

impl PoolCursor {
    fn utilization(&self, pool_size: u32) -> f32 {
        self.current_slot_in_pool as f32 / pool_size as f32
    }

    /// True if the currently-active pool is the last allocated one and is
    /// past [`GROWTH_THRESHOLD`] utilization, i.e. a fresh pool should be
    /// appended before recording continues.
    pub fn needs_growth(&self, pool_size: u32, num_pools: usize) -> bool {
        num_pools > 0 && self.current_pool + 1 == num_pools && self.utilization(pool_size) > GROWTH_THRESHOLD
    }

    /// True if the active pool has no more free slots and a write must roll
    /// over to the next pool.
    pub fn needs_rollover(&self, pool_size: u32) -> bool {
        self.current_slot_in_pool >= pool_size
    }

    pub fn rollover(&mut self) {
        self.current_pool += 1;
        self.current_slot_in_pool = 0;
    }

    /// Records a write into the current slot, advances both cursors, and
    /// returns the absolute index that was just written.
    pub fn record_write(&mut self) -> u64 {
        let absolute = self.absolute_index;
        self.absolute_index += 1;
        self.current_slot_in_pool += 1;
        absolute
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

struct HardwarePool {
    handle: vk::QueryPool,
    /// High-water mark of slots written since the last reset; used to know
    /// how much of a partially filled pool needs copying in `write_results`.
    used: u32,
    reset_pending: bool,
}

/// Something that can receive resolved timestamp values in absolute-index
/// order. [`TimestampQueryPool::write_results`] drives one of these instead
/// of returning an owned `Vec` directly, so the result resolver (C6) can
/// write straight into a per-command-buffer contiguous buffer without an
/// intermediate allocation per pool.
pub trait TimestampWriter {
    fn write(&mut self, values: &[u64]);
}

impl TimestampWriter for Vec<u64> {
    fn write(&mut self, values: &[u64]) {
        self.extend_from_slice(values);
    }
}

/// Growing ring of timestamp query pools owned by a single command-buffer
/// record.
pub struct TimestampQueryPool {
    device: Device,
    family_index: u32,
    pool_size: u32,
    pools: Vec<HardwarePool>,
    cursor: PoolCursor,
}

impl TimestampQueryPool {
    pub fn new(device: Device, family_index: u32) -> Self {
        Self {
            device,
            family_index,
            pool_size: DEFAULT_POOL_SIZE,
            pools: Vec::new(),
            cursor: PoolCursor::default(),
        }
    }

    fn allocate_pool(&self) -> Result<vk::QueryPool, ProfilerError> {
        let info = vk::QueryPoolCreateInfo::builder()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(self.pool_size);
        unsafe {
            self.device
                .create_query_pool(&info, None)
                .map_err(|_| ProfilerError::OutOfMemory)
        }
    }

    fn push_pool(&mut self) -> Result<(), ProfilerError> {
        let handle = self.allocate_pool()?;
        self.pools.push(HardwarePool {
            handle,
            used: 0,
            reset_pending: true,
        });
        Ok(())
    }

    fn ensure_current_pool(&mut self) -> Result<(), ProfilerError> {
        if self.pools.is_empty() {
            self.push_pool()?;
        }
        Ok(())
    }

    /// If the current pool is above 80% utilization, append a fresh pool and
    /// mark it for reset on the command buffer. Call this before any
    /// recording sequence likely to consume queries.
    pub fn preallocate(&mut self) -> Result<(), ProfilerError> {
        self.ensure_current_pool()?;
        if self.cursor.needs_growth(self.pool_size, self.pools.len()) {
            self.push_pool()?;
        }
        Ok(())
    }

    /// Emits pool-reset commands for every partially filled pool and rewinds
    /// the cursors. Every written slot must be preceded by a reset.
    pub fn reset(&mut self, cmd: vk::CommandBuffer) {
        for pool in &mut self.pools {
            if pool.reset_pending || pool.used > 0 {
                unsafe {
                    self.device.cmd_reset_query_pool(cmd, pool.handle, 0, self.pool_size);
                }
                pool.used = 0;
                pool.reset_pending = false;
            }
        }
        self.cursor.reset();
    }

    /// Advances the cursors, emits a timestamp write at `stage`, and returns
    /// the absolute index of the slot written. Rolls to the next pool
    /// (allocating one if none is queued) when the current pool is
    /// exhausted. Returns `Err` only if a new pool would be required and
    /// allocation fails — the caller must degrade the record on this path,
    /// never fail the intercepted Vulkan call.
    pub fn write_timestamp(
        &mut self,
        cmd: vk::CommandBuffer,
        stage: PipelineStage,
    ) -> Result<u64, ProfilerError> {
        self.ensure_current_pool()?;
        if self.cursor.needs_rollover(self.pool_size) {
            if self.cursor.current_pool + 1 >= self.pools.len() {
                self.push_pool()?;
            }
            self.cursor.rollover();
            if self.pools[self.cursor.current_pool].reset_pending {
                unsafe {
                    self.device.cmd_reset_query_pool(
                        cmd,
                        self.pools[self.cursor.current_pool].handle,
                        0,
                        self.pool_size,
                    );
                }
                self.pools[self.cursor.current_pool].reset_pending = false;
            }
        }

        let pool = &mut self.pools[self.cursor.current_pool];
        unsafe {
            self.device.cmd_write_timestamp2(cmd, stage, pool.handle, self.cursor.current_slot_in_pool);
        }
        pool.used = pool.used.max(self.cursor.current_slot_in_pool + 1);
        Ok(self.cursor.record_write())
    }

    /// Copies every full pool in order, then the partial last pool, into
    /// `writer`. The resulting sequence is indexed exactly by absolute
    /// index, i.e. `writer` receives `absolute_index` slots in ascending
    /// order with no gaps.
    pub fn write_results(&self, writer: &mut dyn TimestampWriter) -> Result<(), ProfilerError> {
        let flags = vk::QueryResultFlags::TYPE_64;
        for (i, pool) in self.pools.iter().enumerate() {
            let count = if i == self.cursor.current_pool {
                self.cursor.current_slot_in_pool
            } else {
                pool.used
            };
            if count == 0 {
                continue;
            }
            let mut buffer = vec![0u64; count as usize];
            unsafe {
                self.device
                    .get_query_pool_results(pool.handle, 0, count, buffer.as_mut_slice(), flags)
                    .map_err(ProfilerError::from)?;
            }
            writer.write(&buffer);
            if i == self.cursor.current_pool {
                break;
            }
        }
        Ok(())
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    pub fn absolute_index(&self) -> u64 {
        self.cursor.absolute_index
    }
}

impl Drop for TimestampQueryPool {
    fn drop(&mut self) {
        for pool in &self.pools {
            unsafe {
                self.device.destroy_query_pool(pool.handle, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_triggers_only_past_threshold_on_the_last_pool() {
        let mut cursor = PoolCursor::default();
        cursor.current_slot_in_pool = (DEFAULT_POOL_SIZE as f32 * 0.79) as u32;
        assert!(!cursor.needs_growth(DEFAULT_POOL_SIZE, 1));
        cursor.current_slot_in_pool = (DEFAULT_POOL_SIZE as f32 * 0.81) as u32;
        assert!(cursor.needs_growth(DEFAULT_POOL_SIZE, 1));
        // Not the last pool: growth check does not apply, a later pool has headroom.
        assert!(!cursor.needs_growth(DEFAULT_POOL_SIZE, 2));
    }

    #[test]
    fn absolute_index_is_monotonic_across_a_pool_rollover() {
        let mut cursor = PoolCursor::default();
        let pool_size = 4u32;
        let mut written = Vec::new();
        for _ in 0..pool_size {
            written.push(cursor.record_write());
        }
        assert!(cursor.needs_rollover(pool_size));
        cursor.rollover();
        for _ in 0..pool_size {
            written.push(cursor.record_write());
        }
        for pair in written.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(written, (0..pool_size as u64 * 2).collect::<Vec<_>>());
    }

    #[test]
    fn reset_rewinds_all_cursors() {
        let mut cursor = PoolCursor::default();
        cursor.record_write();
        cursor.rollover();
        cursor.record_write();
        cursor.reset();
        assert_eq!(cursor, PoolCursor::default());
    }
}
