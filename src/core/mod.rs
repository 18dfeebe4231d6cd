//! Device wrapper, error type, and the dispatch registry (C1).

pub mod device;
pub mod dispatch;
pub mod error;

pub use device::{Device, QueueFamilyTiming};
pub use dispatch::{dispatch_key_of, DispatchKey, DispatchRegistry};
pub use error::ProfilerError;
