//! Frame aggregator (C7): region-tree construction plus the per-frame
//! publishing surface.

pub mod frame;
pub mod tree;

pub use frame::{build_frame, CounterReport, FrameAggregator, FrameData, FrameDelimiter, ResolvedSubmission};
pub use tree::{PipelineVisitor, RegionKind, RegionNode, RegionProperties};
