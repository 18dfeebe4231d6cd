//! Submit tracker (C5): validates command-buffer state at submit time,
//! stamps a host-clock time for ordering across queues, and hands off to
//! the result resolver once the GPU finishes.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use ash::vk;

use crate::arena::{Arena, ArenaIndex};
use crate::command::{CommandBufferRecord, CommandRecorder};
use crate::core::device::Device;
use crate::core::error::ProfilerError;

/// One `vkQueueSubmit2`-equivalent entry: the command buffers recorded in
/// one `VkSubmitInfo`.
#[derive(Debug, Clone)]
pub struct SubmitInfo {
    pub command_buffers: Vec<ArenaIndex>,
}

/// A batch of submits issued in a single `vkQueueSubmit*` call, stamped with
/// the host time it was issued and the fence (application-owned or
/// internally allocated) that signals its completion.
#[derive(Debug)]
pub struct SubmitBatch {
    pub queue_family: u32,
    pub submits: Vec<SubmitInfo>,
    pub host_submit_time: Instant,
    pub fence: vk::Fence,
    pub owns_fence: bool,
    /// Records detached from their command pool (freed/pool-reset) while
    /// still `Pending`; the batch is their sole owner until the resolver
    /// consumes them.
    pub detached: Vec<CommandBufferRecord>,
}

/// Queues fully-signaled batches for the resolver and, on request, drains
/// whatever has already completed. One instance per device.
#[derive(Default)]
pub struct SubmitTracker {
    queue: Mutex<VecDeque<SubmitBatch>>,
}

impl SubmitTracker {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Transitions every command buffer referenced by `submits` from
    /// `Executable` to `Pending`, allocates an internal fence if the
    /// application did not supply one, calls `forward` to issue the native
    /// submit, and enqueues the resulting batch for the resolver.
    ///
    /// Per spec.md §7, a tracking failure here (a command buffer not
    /// `Executable`, fence allocation OOM) is logged and degrades tracking
    /// for this batch rather than failing the call — `forward` still runs.
    /// Returns the fence the batch was tracked under, or `None` if fence
    /// allocation failed and the batch could not be tracked at all (the
    /// native submit still happened via `forward`).
    pub fn submit<F>(
        &self,
        device: &Device,
        records: &mut Arena<CommandBufferRecord>,
        queue_family: u32,
        submits: Vec<SubmitInfo>,
        application_fence: Option<vk::Fence>,
        forward: F,
    ) -> Result<Option<vk::Fence>, ProfilerError>
    where
        F: FnOnce(vk::Fence) -> Result<(), ProfilerError>,
    {
        for submit in &submits {
            for &index in &submit.command_buffers {
                match records.get_mut(index) {
                    Some(record) => {
                        if let Err(e) = CommandRecorder::new(record).transition_to_pending() {
                            log::warn!("submit: command buffer {index:?} not executable: {e}");
                        }
                    }
                    None => log::warn!("submit: unknown command buffer record {index:?}"),
                }
            }
        }

        let (fence, owns_fence) = match application_fence {
            Some(fence) => (fence, false),
            None => match self.create_fence(device) {
                Ok(fence) => (fence, true),
                Err(e) => {
                    log::warn!("submit: failed to allocate tracking fence, batch will not be tracked: {e}");
                    forward(vk::Fence::null())?;
                    return Ok(None);
                }
            },
        };

        let host_submit_time = Instant::now();
        forward(fence)?;

        let batch = SubmitBatch {
            queue_family,
            submits,
            host_submit_time,
            fence,
            owns_fence,
            detached: Vec::new(),
        };
        self.queue.lock().unwrap().push_back(batch);
        Ok(Some(fence))
    }

    fn create_fence(&self, device: &Device) -> Result<vk::Fence, ProfilerError> {
        let info = vk::FenceCreateInfo::builder();
        unsafe { device.create_fence(&info, None).map_err(ProfilerError::from) }
    }

    /// Moves a still-`Pending` record out of the command pool's ownership
    /// (e.g. the application freed the command buffer or reset its pool
    /// while GPU work referencing it was in flight) into whichever enqueued
    /// batch references it. The batch becomes the record's sole owner until
    /// the resolver consumes it.
    pub fn detach(&self, fence: vk::Fence, record: CommandBufferRecord) {
        let mut queue = self.queue.lock().unwrap();
        if let Some(batch) = queue.iter_mut().find(|b| b.fence == fence) {
            batch.detached.push(record);
        }
    }

    /// Pops every batch whose fence has signaled, in FIFO (submit) order.
    /// Rotates the internal queue under lock into a worker-local `Vec` to
    /// minimize hold time, per spec.md §5.
    pub fn drain_signaled(&self, device: &Device) -> Vec<SubmitBatch> {
        let pending: Vec<SubmitBatch> = {
            let mut queue = self.queue.lock().unwrap();
            std::mem::take(&mut *queue).into_iter().collect()
        };

        let mut signaled = Vec::new();
        let mut still_pending = VecDeque::new();
        for batch in pending {
            let status = unsafe { device.get_fence_status(batch.fence) };
            match status {
                Ok(true) => signaled.push(batch),
                Ok(false) => still_pending.push_back(batch),
                Err(_) => still_pending.push_back(batch),
            }
        }

        if !still_pending.is_empty() {
            let mut queue = self.queue.lock().unwrap();
            for batch in still_pending.into_iter().rev() {
                queue.push_front(batch);
            }
        }
        signaled
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

/// Host-clock-order comparator used when the aggregator merges submit
/// batches drained from multiple queues into one frame's timeline, so a
/// later submit on one queue never appears ahead of an earlier submit on
/// another.
pub fn order_by_host_time(batches: &mut [SubmitBatch]) {
    batches.sort_by_key(|b| b.host_submit_time);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_at(millis_from_epoch_origin: Instant) -> SubmitBatch {
        SubmitBatch {
            queue_family: 0,
            submits: Vec::new(),
            host_submit_time: millis_from_epoch_origin,
            fence: vk::Fence::null(),
            owns_fence: true,
            detached: Vec::new(),
        }
    }

    #[test]
    fn order_by_host_time_sorts_ascending() {
        let t0 = Instant::now();
        let t1 = t0 + std::time::Duration::from_millis(5);
        let t2 = t0 + std::time::Duration::from_millis(10);

        let mut batches = vec![batch_at(t2), batch_at(t0), batch_at(t1)];
        order_by_host_time(&mut batches);

        assert_eq!(batches[0].host_submit_time, t0);
        assert_eq!(batches[1].host_submit_time, t1);
        assert_eq!(batches[2].host_submit_time, t2);
    }

    #[test]
    fn new_tracker_has_no_pending_batches() {
        let tracker = SubmitTracker::new();
        assert_eq!(tracker.pending_len(), 0);
    }
}
