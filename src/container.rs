//! Top-level file framing (§6.1): the file magic, the footer, and the
//! `IndexLocation` choice between index-at-start and index-at-end layouts.

use crate::error::{RacError, RacResult};
use crate::primitive::{read_u48, write_u48, CPtr, DPtr};

/// The 4 bytes every RAC file opens with, before either the root node
/// (index-at-start) or the first chunk (index-at-end).
pub const FILE_MAGIC: [u8; 4] = *b"racC";

/// Trailer magic closing the fixed-size footer.
pub const FOOTER_MAGIC: [u8; 4] = *b"racF";

/// Fixed footer size: 6 (DFileSize) + 6 (root CPtr) + 8 (reserved checksum)
/// + 4 (trailer magic).
pub const FOOTER_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLocation {
    Start,
    End,
}

/// The fixed-size record at the end of every non-empty RAC file (§6.1,
/// §9's "reserved checksum field... not populated or verified").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub d_file_size: DPtr,
    pub root_cptr: CPtr,
    /// Preserved byte-for-byte, never computed or checked (§9 open question).
    pub reserved_checksum: [u8; 8],
}

impl Footer {
    pub fn encode(&self) -> [u8; FOOTER_LEN] {
        let mut out = Vec::with_capacity(FOOTER_LEN);
        write_u48(&mut out, self.d_file_size);
        write_u48(&mut out, self.root_cptr);
        out.extend_from_slice(&self.reserved_checksum);
        out.extend_from_slice(&FOOTER_MAGIC);
        out.try_into().expect("footer is exactly FOOTER_LEN bytes")
    }

    pub fn decode(src: &[u8]) -> RacResult<Footer> {
        if src.len() != FOOTER_LEN {
            return Err(RacError::Truncated);
        }
        let d_file_size = read_u48(src, 0)?;
        let root_cptr = read_u48(src, 6)?;
        let mut reserved_checksum = [0u8; 8];
        reserved_checksum.copy_from_slice(&src[12..20]);
        if src[20..24] != FOOTER_MAGIC {
            return Err(RacError::BadMagic);
        }
        Ok(Footer {
            d_file_size,
            root_cptr,
            reserved_checksum,
        })
    }
}
