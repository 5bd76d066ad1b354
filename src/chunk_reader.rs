//! Chunk reader (§4.3): a lazy, forward-only walk over a file's leaves
//! without touching any codec. Used for structural summaries (total
//! decompressed size, chunk boundaries, codecs in use) and as the work
//! source the decoding engine's dispatcher pulls from.

use crate::index::{IndexReader, LeafEntry};
use crate::primitive::DPtr;

/// One chunk's metadata: `(chunkCRange, dRange, codecTag, resources…)` as
/// named in §4.3 — identical to an index `LeafEntry`, surfaced here under
/// the Chunk Reader's own name since that is the public-facing component.
pub type ChunkEntry = LeafEntry;

pub struct ChunkReader<'a> {
    index: &'a IndexReader,
}

impl<'a> ChunkReader<'a> {
    pub fn new(index: &'a IndexReader) -> Self {
        ChunkReader { index }
    }

    pub fn d_file_size(&self) -> DPtr {
        self.index.d_file_size()
    }

    /// The full, ordered sequence of chunks in the file.
    pub fn chunks(&self) -> impl Iterator<Item = crate::error::RacResult<ChunkEntry>> + '_ {
        self.index.iterate_leaves(self.index.root_drange())
    }

    /// Structural summary: total decompressed size, chunk count, and the
    /// distinct codec tags referenced — the use case §4.3 calls out
    /// explicitly ("tools that only need the structural summary").
    pub fn summarize(&self) -> crate::error::RacResult<Summary> {
        let mut chunk_count = 0u64;
        let mut codecs = Vec::new();
        for entry in self.chunks() {
            let entry = entry?;
            chunk_count += 1;
            if !codecs.contains(&entry.codec_tag) {
                codecs.push(entry.codec_tag);
            }
        }
        codecs.sort_unstable();
        Ok(Summary {
            d_file_size: self.d_file_size(),
            chunk_count,
            codecs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub d_file_size: DPtr,
    pub chunk_count: u64,
    pub codecs: Vec<u8>,
}
