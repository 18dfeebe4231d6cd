//! Exposes the profiler error type.
//!
//! Kinds map 1:1 onto spec.md §7. Recording and submit hot paths never
//! return this type — they degrade locally instead (set a record's
//! `degraded` flag, drop counters, keep forwarding the call). This type is
//! only surfaced from creation paths and the extension surface.

use std::sync::PoisonError;

use thiserror::Error;

/// Error type returned from the profiler's non-hot-path APIs.
#[derive(Error, Debug)]
pub enum ProfilerError {
    /// A handle passed to a public entry point is not known to the dispatch
    /// registry or the relevant record registry.
    #[error("invalid handle")]
    InvalidHandle,
    /// The requested resource or result does not exist yet. This is an
    /// expected steady-state answer, e.g. `get_frame_data` before the first
    /// frame delimiter.
    #[error("not ready")]
    NotReady,
    /// Caller-supplied parameters failed validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// The request cannot be satisfied, e.g. a custom counter set that would
    /// require more than one hardware pass.
    #[error("unsatisfiable: {0}")]
    Unsatisfiable(String),
    /// Host or device allocation failed.
    #[error("out of memory")]
    OutOfMemory,
    /// A dependency required to initialize a component was unavailable.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// The capability is not present on this device/driver.
    #[error("feature not present: {0}")]
    FeatureNotPresent(String),
    /// A vendor counter backend failed to load.
    #[error("driver incompatible: {0}")]
    DriverIncompatible(String),
    /// A driver call forwarded to the next layer failed.
    #[error("vulkan error: {0}")]
    VkError(ash::vk::Result),
    /// Assertion-worthy internal error; should never happen in correct code.
    #[error("internal error: {0}")]
    Internal(String),
    /// A shared lock was poisoned by a panicking thread.
    #[error("poisoned lock")]
    PoisonError,
}

impl From<ash::vk::Result> for ProfilerError {
    fn from(value: ash::vk::Result) -> Self {
        ProfilerError::VkError(value)
    }
}

impl<T> From<PoisonError<T>> for ProfilerError {
    fn from(_: PoisonError<T>) -> Self {
        ProfilerError::PoisonError
    }
}
