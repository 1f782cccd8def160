//! In-memory vector index
//!
//! Only exhaustive search is provided: every query scans all stored vectors. For the
//! corpus sizes this engine targets (thousands of paragraphs) a scan takes well under a
//! millisecond and returns exact results.

pub mod flat_index;

pub use flat_index::{FlatIndex, Metric, Neighbor};
