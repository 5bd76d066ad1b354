//! Codec dispatch (§2 ~5%, §4.8, §6.4).
//!
//! A polymorphic façade over per-codec decoder/encoder pairs. RAC's core
//! never knows how any codec works — it only knows the tiny
//! `CodecDecoder`/`CodecEncoder` contract and a codec's declared resource
//! and rewindability capabilities. Dispatch is by array index (the codec
//! tag), matching §9's "enumerable set of capability objects indexed by
//! codec tag... lookups are O(1) and the RAC core never allocates inside
//! the dispatch path."

pub mod lz4;
pub mod store;

use crate::error::{RacError, RacResult};

/// A codec's decoding half. Implementations must produce exactly
/// `expected_len` decompressed bytes for a well-formed chunk, or fail
/// (§6.4).
pub trait CodecDecoder: Send + Sync {
    fn decode(&self, chunk: &[u8], resources: &[&[u8]], expected_len: usize) -> RacResult<Vec<u8>>;
}

/// A codec's encoding half.
pub trait CodecEncoder: Send + Sync {
    fn encode(&self, source: &[u8], resources: &[&[u8]]) -> RacResult<Vec<u8>>;

    /// How many resource blobs (e.g. shared dictionaries) this codec's
    /// encode/decode calls accept. The encoder driver and index reader use
    /// this to validate resource reference counts (§3, §4.8).
    fn resource_count(&self) -> usize {
        0
    }

    /// Whether a speculative `encode` call can be retried with a smaller
    /// input window without re-reading already-consumed source bytes
    /// in-place (§4.6's `CChunkSize` bisection strategy). `false` means the
    /// driver must buffer the decompressed window itself for retry, which
    /// every codec shipped in this crate requires.
    fn is_rewindable(&self) -> bool {
        false
    }
}

/// The combined capability set a codec registers under one tag.
pub trait Codec: CodecDecoder + CodecEncoder {
    fn tag(&self) -> u8;
}

/// O(1) tag -> codec lookup table. Construction allocates; dispatch does
/// not.
pub struct CodecRegistry {
    by_tag: Vec<Option<Box<dyn Codec>>>,
}

impl CodecRegistry {
    /// An empty registry — no codecs registered.
    pub fn empty() -> Self {
        CodecRegistry { by_tag: Vec::new() }
    }

    /// A registry with the codecs this crate ships: `store` (tag 0,
    /// identity) and `lz4_block` (tag 1, the teacher's LZ4 block codec).
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register(Box::new(store::StoreCodec));
        reg.register(Box::new(lz4::Lz4BlockCodec));
        reg
    }

    pub fn register(&mut self, codec: Box<dyn Codec>) {
        let tag = codec.tag() as usize;
        if self.by_tag.len() <= tag {
            self.by_tag.resize_with(tag + 1, || None);
        }
        self.by_tag[tag] = Some(codec);
    }

    pub fn get(&self, tag: u8) -> RacResult<&dyn Codec> {
        self.by_tag
            .get(tag as usize)
            .and_then(|slot| slot.as_deref())
            .ok_or(RacError::UnsupportedCodec(tag))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Well-known tags for the codecs this crate ships.
pub const TAG_STORE: u8 = 0;
pub const TAG_LZ4_BLOCK: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_store_and_lz4() {
        let reg = CodecRegistry::with_builtins();
        assert_eq!(reg.get(TAG_STORE).unwrap().tag(), TAG_STORE);
        assert_eq!(reg.get(TAG_LZ4_BLOCK).unwrap().tag(), TAG_LZ4_BLOCK);
    }

    #[test]
    fn unregistered_tag_is_unsupported_codec_error() {
        let reg = CodecRegistry::with_builtins();
        assert_eq!(reg.get(200), Err(RacError::UnsupportedCodec(200)));
    }

    #[test]
    fn empty_registry_has_no_codecs() {
        let reg = CodecRegistry::empty();
        assert!(reg.get(TAG_STORE).is_err());
    }
}
