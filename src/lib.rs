//! Vulkan instrumentation layer that traces GPU work into a hierarchical,
//! time-resolved frame tree.
//!
//! The layer sits between the application and the driver as an implicit
//! Vulkan layer. It intercepts command-buffer recording and queue submission
//! to attribute GPU time to render passes, subpasses, and pipelines without
//! the application changing a single call. To get started:
//! ```
//! use vk_trace_layer::prelude::*;
//!
//! let device = Device::new(raw_device, physical_device, instance);
//! let profiler = DeviceProfiler::new(device, ProfilerConfig::load());
//! ```
//! Command-buffer interception goes through [`DeviceProfiler::with_recorder`],
//! which hands out a [`CommandRecorder`] wrapping each recorded command with
//! GPU timestamps. Once frames are submitted and delimited, the resulting
//! tree is available from [`DeviceProfiler::get_frame_data`].
//!
//! For further detail, check out the following modules:
//! - [`query`] for timestamp pools and the performance-counter provider trait.
//! - [`command`] for command-buffer recording and its lifecycle state machine.
//! - [`submit`] for submit tracking and result resolution.
//! - [`aggregate`] for the region tree and per-frame publishing surface.
//! - [`memory`] for the background host-allocation sampler.
//! - [`extension`] for the stable operation surface consumers call into.

pub mod prelude;
pub use crate::prelude::*;

pub mod aggregate;
pub mod arena;
pub mod command;
pub mod config;
pub mod core;
pub mod debug_names;
pub mod device_profiler;
pub mod extension;
pub mod memory;
pub mod query;
pub mod submit;
