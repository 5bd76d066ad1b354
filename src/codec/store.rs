//! The `store` codec (tag 0): the identity transform.
//!
//! Used by tests that care about index shape rather than compression
//! ratio, and by §8 scenario 1 ("no-op identity codec").

use super::{Codec, CodecDecoder, CodecEncoder, TAG_STORE};
use crate::error::{RacError, RacResult};

pub struct StoreCodec;

impl CodecDecoder for StoreCodec {
    fn decode(&self, chunk: &[u8], _resources: &[&[u8]], expected_len: usize) -> RacResult<Vec<u8>> {
        if chunk.len() != expected_len {
            return Err(RacError::CodecReported {
                tag: TAG_STORE,
                message: format!(
                    "store codec expects chunk length {expected_len}, got {}",
                    chunk.len()
                ),
            });
        }
        Ok(chunk.to_vec())
    }
}

impl CodecEncoder for StoreCodec {
    fn encode(&self, source: &[u8], _resources: &[&[u8]]) -> RacResult<Vec<u8>> {
        Ok(source.to_vec())
    }

    fn is_rewindable(&self) -> bool {
        // Re-encoding any window always produces that same window's bytes,
        // so a smaller window never needs the original to be re-read.
        true
    }
}

impl Codec for StoreCodec {
    fn tag(&self) -> u8 {
        TAG_STORE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_is_identity() {
        let codec = StoreCodec;
        let src = b"hello world";
        let encoded = codec.encode(src, &[]).unwrap();
        assert_eq!(encoded, src);
        let decoded = codec.decode(&encoded, &[], src.len()).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let codec = StoreCodec;
        let err = codec.decode(b"abc", &[], 10).unwrap_err();
        assert!(matches!(err, RacError::CodecReported { tag, .. } if tag == TAG_STORE));
    }
}
