//! Drives a [`CommandBufferRecord`] through the Vulkan command-buffer
//! lifecycle and performs the per-command timestamp wrapping described in
//! spec.md §4.4.

use ash::vk;

use crate::command::command::{Command, CommandKind, TimestampRange};
use crate::command::record::{CommandBufferRecord, CommandBufferState};
use crate::command::state_machine;
use crate::core::error::ProfilerError;

/// Thin wrapper that enforces the command-buffer state machine around a
/// [`CommandBufferRecord`]. One recorder per record; interception code
/// looks the record up by handle, borrows it, and drives it through this
/// type rather than mutating `state` directly.
pub struct CommandRecorder<'a> {
    record: &'a mut CommandBufferRecord,
}

impl<'a> CommandRecorder<'a> {
    pub fn new(record: &'a mut CommandBufferRecord) -> Self {
        Self { record }
    }

    /// `vkBeginCommandBuffer`. Valid from `Initial` or `Executable` (a
    /// re-record without an explicit reset). Fails with `not-ready` if the
    /// command buffer is still `Pending` on a queue.
    pub fn begin(&mut self) -> Result<(), ProfilerError> {
        self.record.state = state_machine::begin(self.record.state)?;
        self.record.clear_for_reset();
        Ok(())
    }

    /// `vkEndCommandBuffer`.
    pub fn end(&mut self) -> Result<(), ProfilerError> {
        self.record.state = state_machine::end(self.record.state)?;
        Ok(())
    }

    /// Called by the submit tracker (C5) for each command buffer in a batch.
    pub fn transition_to_pending(&mut self) -> Result<(), ProfilerError> {
        self.record.state = state_machine::transition_to_pending(self.record.state)?;
        Ok(())
    }

    /// Called when the fence covering this record's submission signals.
    pub fn fence_signaled(&mut self) {
        self.record.state = state_machine::fence_signaled(self.record.state);
    }

    /// `vkResetCommandBuffer` or an implicit pool reset.
    pub fn reset(&mut self) -> Result<(), ProfilerError> {
        self.record.state = state_machine::reset(self.record.state)?;
        self.record.clear_for_reset();
        Ok(())
    }

    /// External free or command-pool reset/destroy while the record was not
    /// already consumed by the submit tracker.
    pub fn invalidate(&mut self) {
        self.record.state = state_machine::invalidate(self.record.state);
    }

    pub fn state(&self) -> CommandBufferState {
        self.record.state
    }

    /// Wraps one intercepted command: ensures pool headroom, writes the
    /// begin/end timestamp pair around `forward`, and appends the resulting
    /// [`Command`] to the record.
    ///
    /// `forward` performs the actual call to the next layer and is given the
    /// raw `VkCommandBuffer` handle; it always runs, even when the record is
    /// degraded or pool growth fails — the intercepted Vulkan call must
    /// never fail because the profiler could not keep up.
    pub fn record_command<F>(&mut self, kind: CommandKind, forward: F)
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let cmd = self.record.handle;

        if self.record.degraded {
            forward(cmd);
            self.record.commands.push(Command::new(kind, TimestampRange::default()));
            return;
        }

        if self.record.timestamp_pool.preallocate().is_err() {
            self.record.degraded = true;
            forward(cmd);
            self.record.commands.push(Command::new(kind, TimestampRange::default()));
            return;
        }

        let begin = self.record.timestamp_pool.write_timestamp(cmd, kind.begin_stage()).ok();
        if begin.is_none() {
            self.record.degraded = true;
        }

        forward(cmd);

        let end = if self.record.degraded {
            None
        } else {
            match self.record.timestamp_pool.write_timestamp(cmd, kind.end_stage()) {
                Ok(idx) => Some(idx),
                Err(_) => {
                    self.record.degraded = true;
                    None
                }
            }
        };

        self.record
            .commands
            .push(Command::new(kind, TimestampRange { begin, end }));
    }

    /// Like [`Self::record_command`] but additionally brackets the whole
    /// call with a second "segment" timestamp pair, used by render-pass
    /// begin/end to report driver-side overhead separately (spec.md §4.4).
    pub fn record_command_with_segment<F>(&mut self, kind: CommandKind, forward: F)
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let cmd = self.record.handle;

        if self.record.degraded || self.record.timestamp_pool.preallocate().is_err() {
            self.record.degraded = true;
            forward(cmd);
            self.record.commands.push(Command::new(kind, TimestampRange::default()));
            return;
        }

        let segment_begin = self.record.timestamp_pool.write_timestamp(cmd, kind.begin_stage()).ok();
        let begin = self.record.timestamp_pool.write_timestamp(cmd, kind.begin_stage()).ok();

        forward(cmd);

        let end = self.record.timestamp_pool.write_timestamp(cmd, kind.end_stage()).ok();
        let segment_end = self.record.timestamp_pool.write_timestamp(cmd, kind.end_stage()).ok();

        if begin.is_none() || end.is_none() {
            self.record.degraded = true;
        }

        let segment = TimestampRange {
            begin: segment_begin,
            end: segment_end,
        };
        self.record
            .commands
            .push(Command::new(kind, TimestampRange { begin, end }).with_segment(segment));
    }
}
