//! Varint & primitive codec (§2, ~5% of the implementation).
//!
//! Fixed little-endian integers and the length-prefix conventions used by
//! node encodings (§4.1, §6.1). All multi-byte integers in a RAC file are
//! little-endian; `CPtr`/`DPtr` are 48-bit offsets packed into 6 bytes on
//! the wire.

use crate::error::{RacError, RacResult};

/// A 48-bit offset in compressed-byte space (CSpace).
pub type CPtr = u64;
/// A 48-bit offset in decompressed-byte space (DSpace).
pub type DPtr = u64;

/// Largest value representable in 48 bits.
pub const MAX_48: u64 = (1u64 << 48) - 1;

/// Read a little-endian `u16` from `src` at `offset`.
#[inline]
pub fn read_u16(src: &[u8], offset: usize) -> RacResult<u16> {
    let bytes = src
        .get(offset..offset + 2)
        .ok_or(RacError::Truncated)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Write a little-endian `u16` into `dst` at `offset`.
#[inline]
pub fn write_u16(dst: &mut Vec<u8>, value: u16) {
    dst.extend_from_slice(&value.to_le_bytes());
}

/// Read a little-endian `u32` from `src` at `offset`.
#[inline]
pub fn read_u32(src: &[u8], offset: usize) -> RacResult<u32> {
    let bytes = src
        .get(offset..offset + 4)
        .ok_or(RacError::Truncated)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

/// Write a little-endian `u32` into `dst`.
#[inline]
pub fn write_u32(dst: &mut Vec<u8>, value: u32) {
    dst.extend_from_slice(&value.to_le_bytes());
}

/// Read a 48-bit little-endian offset (6 bytes on the wire) from `src` at
/// `offset`. Equivalent to `CPtr`/`DPtr` decoding (§6.1).
#[inline]
pub fn read_u48(src: &[u8], offset: usize) -> RacResult<u64> {
    let bytes = src
        .get(offset..offset + 6)
        .ok_or(RacError::Truncated)?;
    let mut buf = [0u8; 8];
    buf[..6].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Write a 48-bit little-endian offset (6 bytes on the wire) into `dst`.
/// Panics if `value` does not fit in 48 bits — callers must validate
/// CPtr/DPtr ranges before encoding (§3 invariant 5).
#[inline]
pub fn write_u48(dst: &mut Vec<u8>, value: u64) {
    debug_assert!(value <= MAX_48, "offset does not fit in 48 bits");
    let bytes = value.to_le_bytes();
    dst.extend_from_slice(&bytes[..6]);
}

/// Read a length-prefixed byte string: a `u32` length followed by that many
/// bytes. Used for node records' variable-length sections.
pub fn read_length_prefixed(src: &[u8], offset: usize) -> RacResult<(&[u8], usize)> {
    let len = read_u32(src, offset)? as usize;
    let start = offset + 4;
    let end = start.checked_add(len).ok_or(RacError::Truncated)?;
    let bytes = src.get(start..end).ok_or(RacError::Truncated)?;
    Ok((bytes, end))
}

/// Append a length-prefixed byte string to `dst`.
pub fn write_length_prefixed(dst: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(dst, bytes.len() as u32);
    dst.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_roundtrip() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 0xBEEF);
        assert_eq!(read_u16(&buf, 0).unwrap(), 0xBEEF);
    }

    #[test]
    fn u32_roundtrip() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0xDEAD_BEEF);
        assert_eq!(read_u32(&buf, 0).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn u48_roundtrip_max() {
        let mut buf = Vec::new();
        write_u48(&mut buf, MAX_48);
        assert_eq!(buf.len(), 6);
        assert_eq!(read_u48(&buf, 0).unwrap(), MAX_48);
    }

    #[test]
    fn u48_roundtrip_zero() {
        let mut buf = Vec::new();
        write_u48(&mut buf, 0);
        assert_eq!(read_u48(&buf, 0).unwrap(), 0);
    }

    #[test]
    fn u48_truncated_is_error() {
        let buf = [0u8; 3];
        assert_eq!(read_u48(&buf, 0), Err(RacError::Truncated));
    }

    #[test]
    fn length_prefixed_roundtrip() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, b"hello");
        let (bytes, next) = read_length_prefixed(&buf, 0).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(next, buf.len());
    }

    #[test]
    fn length_prefixed_truncated_body_is_error() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 100); // claims 100 bytes follow but none do
        assert_eq!(
            read_length_prefixed(&buf, 0).unwrap_err(),
            RacError::Truncated
        );
    }

    #[test]
    fn offset_out_of_range_is_truncated_not_panic() {
        let buf = [1u8, 2, 3];
        assert_eq!(read_u32(&buf, 10), Err(RacError::Truncated));
    }
}
