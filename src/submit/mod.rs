//! Submit tracking (C5) and result resolution (C6).

pub mod resolver;
pub mod tracker;

pub use resolver::{mask_timestamp, resolve_command_buffer, wrap_corrected_delta_ticks, ResolvedCommand, ResolvedCommandBuffer};
pub use tracker::{order_by_host_time, SubmitBatch, SubmitInfo, SubmitTracker};
