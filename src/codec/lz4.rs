//! The `lz4_block` codec (tag 1): the teacher's LZ4 block engine plugged in
//! behind the codec interface as one pluggable codec among others (§6.4).

use super::{Codec, CodecDecoder, CodecEncoder, TAG_LZ4_BLOCK};
use crate::block::{compress_bound, compress_default, decompress_safe};
use crate::error::{RacError, RacResult};

pub struct Lz4BlockCodec;

impl CodecDecoder for Lz4BlockCodec {
    fn decode(&self, chunk: &[u8], _resources: &[&[u8]], expected_len: usize) -> RacResult<Vec<u8>> {
        let mut out = vec![0u8; expected_len];
        let n = decompress_safe(chunk, &mut out).map_err(|e| RacError::CodecReported {
            tag: TAG_LZ4_BLOCK,
            message: format!("{e:?}"),
        })?;
        if n != expected_len {
            return Err(RacError::CodecReported {
                tag: TAG_LZ4_BLOCK,
                message: format!("decompressed {n} bytes, expected {expected_len}"),
            });
        }
        Ok(out)
    }
}

impl CodecEncoder for Lz4BlockCodec {
    fn encode(&self, source: &[u8], _resources: &[&[u8]]) -> RacResult<Vec<u8>> {
        let bound = compress_bound(source.len() as i32);
        if bound <= 0 {
            return Err(RacError::CodecReported {
                tag: TAG_LZ4_BLOCK,
                message: "input too large for LZ4 block compression".into(),
            });
        }
        let mut out = vec![0u8; bound as usize];
        let n = compress_default(source, &mut out).map_err(|e| RacError::CodecReported {
            tag: TAG_LZ4_BLOCK,
            message: format!("{e:?}"),
        })?;
        out.truncate(n);
        Ok(out)
    }

    fn is_rewindable(&self) -> bool {
        // A shorter window compresses to different bytes entirely, so the
        // driver must keep the decompressed window around to retry against.
        false
    }
}

impl Codec for Lz4BlockCodec {
    fn tag(&self) -> u8 {
        TAG_LZ4_BLOCK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let codec = Lz4BlockCodec;
        let src = b"the quick brown fox jumps over the lazy dog, again and again and again";
        let encoded = codec.encode(src, &[]).unwrap();
        let decoded = codec.decode(&encoded, &[], src.len()).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn encode_decode_empty_input() {
        let codec = Lz4BlockCodec;
        let encoded = codec.encode(b"", &[]).unwrap();
        let decoded = codec.decode(&encoded, &[], 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn decode_rejects_garbage_as_codec_error_not_panic() {
        let codec = Lz4BlockCodec;
        let err = codec.decode(&[0xFF, 0xFF, 0xFF, 0xFF], &[], 1000).unwrap_err();
        assert!(matches!(err, RacError::CodecReported { tag, .. } if tag == TAG_LZ4_BLOCK));
    }
}
