//! Wraps the dispatch table the profiler forwards calls to.
//!
//! In a real Vulkan layer this would be the table returned by the next
//! layer's `vkGetDeviceProcAddr` chain; we model it directly as an
//! [`ash::Device`], since that is exactly a table of function pointers and
//! forwarding a call is just calling through it. Everything in `core`,
//! `command`, `submit` and `query` only ever talks to the driver through
//! this type.

use std::sync::Arc;

use ash::vk;
use derivative::Derivative;

/// Per-queue-family timing properties needed to resolve timestamp queries.
#[derive(Debug, Clone, Default)]
pub struct QueueFamilyTiming {
    pub family_index: u32,
    pub timestamp_valid_bits: u32,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
    properties: vk::PhysicalDeviceProperties,
    queue_family_timing: Vec<QueueFamilyTiming>,
}

/// Wrapper around the next layer's `VkDevice` dispatch table, plus the
/// physical-device properties the resolver needs (`timestampPeriod`,
/// per-queue-family `timestampValidBits`). Cheap to clone; internal state is
/// shared through an `Arc`.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    pub fn new(
        handle: ash::Device,
        properties: vk::PhysicalDeviceProperties,
        queue_family_timing: Vec<QueueFamilyTiming>,
    ) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                handle,
                properties,
                queue_family_timing,
            }),
        }
    }

    /// Nanoseconds per timestamp tick, taken from `VkPhysicalDeviceLimits::timestampPeriod`.
    pub fn timestamp_period_ns(&self) -> f32 {
        self.inner.properties.limits.timestamp_period
    }

    /// Number of valid bits in timestamp queries issued on `family_index`, or
    /// 64 if the family is unknown (conservative: no masking applied).
    pub fn timestamp_valid_bits(&self, family_index: u32) -> u32 {
        self.inner
            .queue_family_timing
            .iter()
            .find(|q| q.family_index == family_index)
            .map(|q| q.timestamp_valid_bits)
            .unwrap_or(64)
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.inner.properties
    }

    /// Raw access to the forwarded dispatch table.
    pub fn handle(&self) -> &ash::Device {
        &self.inner.handle
    }
}

impl std::ops::Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.inner.handle
    }
}
