/// Segment trees used for proportional prioritized sampling
pub mod segment_tree;

pub use segment_tree::{MinTree, SegmentTree, SumTree};
