//! Index reader & builder (§4.2, §4.5).

pub mod builder;
pub mod reader;

pub use builder::IndexBuilder;
pub use reader::{IndexReader, Locate};

use crate::primitive::{CPtr, DPtr};

/// One leaf's worth of structural metadata, yielded by `IndexReader::iterate_leaves`
/// and by the Chunk Reader (§4.3) which is just this same walk without decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    pub d_range: std::ops::Range<DPtr>,
    pub c_range: std::ops::Range<CPtr>,
    pub codec_tag: u8,
    /// Global resource-table indices this leaf's chunk was encoded against.
    pub resources: Vec<u32>,
}
