//! Node model & encoding (§2 ~10%, §4.1).
//!
//! A node is the structural unit of the index: a branch (up to 255
//! children, each another node) or a leaf (up to 255 children, each a
//! chunk plus optional resource references). Nodes are read-only once the
//! file is closed; this module only deals with a single node's on-disk
//! record, not tree-wide validation (that is the Index Reader's job, §4.2).

use crate::error::{RacError, RacResult};
use crate::primitive::{read_u32, read_u48, write_u32, write_u48, CPtr, DPtr};

/// Node magic, forward framing: ASCII `racN`.
pub const MAGIC_FORWARD: [u8; 4] = *b"racN";
/// Node magic, backward framing: same bytes with the parity bit (bit 7 of
/// the last byte) set, per §4.1's "magic tag includes a parity bit".
pub const MAGIC_BACKWARD: [u8; 4] = [b'r', b'a', b'c', b'N' | 0x80];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Branch,
    Leaf,
}

/// One child of a branch node: another node, spanning `[prev_end, dptr_end)`
/// in DSpace, whose on-disk record starts at `cptr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchChild {
    pub dptr_end: DPtr,
    pub cptr: CPtr,
}

/// One child of a leaf node: a chunk spanning `[prev_end, dptr_end)` in
/// DSpace, whose compressed bytes live at `[cptr, cptr + clen)` in CSpace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafChild {
    pub dptr_end: DPtr,
    pub cptr: CPtr,
    pub clen: u32,
    pub codec_tag: u8,
    /// Indices into this node's `resource_slots`, resolved to global
    /// resource-table indices by the caller. 0, 1, or 2 entries (§3).
    pub resource_refs: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeChildren {
    Branch(Vec<BranchChild>),
    Leaf(Vec<LeafChild>),
}

/// An in-memory, decoded node record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub drange_lo: DPtr,
    /// Resource-table indices declared at this node (0, 1, or 2 slots),
    /// referenceable by this node's leaf children (§3, §4.1).
    pub resource_slots: Vec<u32>,
    pub children: NodeChildren,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match &self.children {
            NodeChildren::Branch(_) => NodeKind::Branch,
            NodeChildren::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn arity(&self) -> usize {
        match &self.children {
            NodeChildren::Branch(v) => v.len(),
            NodeChildren::Leaf(v) => v.len(),
        }
    }

    /// The end of this node's DRange: the last child's `dptr_end`.
    /// Arity is always >= 1 for a real node (the only arity-0 case is the
    /// sentinel empty-file root, which is never represented as a `Node`).
    pub fn drange_hi(&self) -> DPtr {
        match &self.children {
            NodeChildren::Branch(v) => v.last().expect("arity >= 1").dptr_end,
            NodeChildren::Leaf(v) => v.last().expect("arity >= 1").dptr_end,
        }
    }

    /// Encode this node as a standalone record using the given framing.
    /// The parity bit in the magic is the only difference forward vs.
    /// backward framing makes to the bytes themselves — CPtrs inside are
    /// always absolute file offsets regardless of framing (§4.1).
    pub fn encode(&self, framing: Framing) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(match self.kind() {
            NodeKind::Branch => 0,
            NodeKind::Leaf => 1,
        });
        let arity = self.arity();
        assert!(arity >= 1 && arity <= crate::config::MAX_ARITY as usize);
        body.push(arity as u8);

        // Distinct codec tags referenced by this node's leaf children, in
        // first-seen order (empty for a branch node).
        let codecs: Vec<u8> = match &self.children {
            NodeChildren::Leaf(v) => {
                let mut seen = Vec::new();
                for c in v {
                    if !seen.contains(&c.codec_tag) {
                        seen.push(c.codec_tag);
                    }
                }
                seen
            }
            NodeChildren::Branch(_) => Vec::new(),
        };
        body.push(codecs.len() as u8);
        body.extend_from_slice(&codecs);

        body.push(self.resource_slots.len() as u8);
        for &slot in &self.resource_slots {
            write_u32(&mut body, slot);
        }

        write_u48(&mut body, self.drange_lo);

        match &self.children {
            NodeChildren::Branch(children) => {
                for child in children {
                    write_u48(&mut body, child.dptr_end);
                    write_u48(&mut body, child.cptr);
                }
            }
            NodeChildren::Leaf(children) => {
                for child in children {
                    write_u48(&mut body, child.dptr_end);
                    write_u48(&mut body, child.cptr);
                    let codec_index = codecs
                        .iter()
                        .position(|&t| t == child.codec_tag)
                        .expect("codec tag collected above") as u8;
                    debug_assert!(child.resource_refs.len() <= 2);
                    let flags = codec_index
                        | ((child.resource_refs.len() as u8) << 3);
                    body.push(flags);
                    for &r in &child.resource_refs {
                        let idx = self
                            .resource_slots
                            .iter()
                            .position(|&s| s == r)
                            .expect("resource ref must name a slot declared on this node");
                        body.push(idx as u8);
                    }
                    write_u32(&mut body, child.clen);
                }
            }
        }

        let mut out = Vec::with_capacity(body.len() + 12);
        match framing {
            Framing::Forward => out.extend_from_slice(&MAGIC_FORWARD),
            Framing::Backward => out.extend_from_slice(&MAGIC_BACKWARD),
        }
        out.extend_from_slice(&body);
        write_u32(&mut out, body.len() as u32);
        out
    }

    /// Decode a node whose record starts at byte 0 of `src`. Returns the
    /// node and the number of bytes consumed (including magic, body, and
    /// trailing length marker). Bounds are checked throughout: a truncated
    /// or adversarial record yields `Err`, never a panic or out-of-bounds
    /// read.
    pub fn decode(src: &[u8]) -> RacResult<(Node, usize, Framing)> {
        if src.len() < 4 {
            return Err(RacError::Truncated);
        }
        let magic: [u8; 4] = src[0..4].try_into().unwrap();
        let framing = if magic == MAGIC_FORWARD {
            Framing::Forward
        } else if magic == MAGIC_BACKWARD {
            Framing::Backward
        } else {
            return Err(RacError::BadMagic);
        };

        let mut off = 4usize;
        let kind_byte = *src.get(off).ok_or(RacError::Truncated)?;
        off += 1;
        let kind = match kind_byte {
            0 => NodeKind::Branch,
            1 => NodeKind::Leaf,
            _ => return Err(RacError::BadVersion),
        };

        let arity = *src.get(off).ok_or(RacError::Truncated)? as usize;
        off += 1;
        if arity < 1 || arity > crate::config::MAX_ARITY as usize {
            return Err(RacError::ArityOutOfRange);
        }

        let codec_count = *src.get(off).ok_or(RacError::Truncated)? as usize;
        off += 1;
        let codecs = src
            .get(off..off + codec_count)
            .ok_or(RacError::Truncated)?
            .to_vec();
        off += codec_count;

        let resource_slot_count = *src.get(off).ok_or(RacError::Truncated)? as usize;
        off += 1;
        if resource_slot_count > 2 {
            return Err(RacError::MalformedIndex(
                "a node may declare at most 2 resource slots".into(),
            ));
        }
        let mut resource_slots = Vec::with_capacity(resource_slot_count);
        for _ in 0..resource_slot_count {
            resource_slots.push(read_u32(src, off)?);
            off += 4;
        }

        let drange_lo = read_u48(src, off)?;
        off += 6;

        let children = match kind {
            NodeKind::Branch => {
                let mut v = Vec::with_capacity(arity);
                for _ in 0..arity {
                    let dptr_end = read_u48(src, off)?;
                    off += 6;
                    let cptr = read_u48(src, off)?;
                    off += 6;
                    v.push(BranchChild { dptr_end, cptr });
                }
                NodeChildren::Branch(v)
            }
            NodeKind::Leaf => {
                let mut v = Vec::with_capacity(arity);
                for _ in 0..arity {
                    let dptr_end = read_u48(src, off)?;
                    off += 6;
                    let cptr = read_u48(src, off)?;
                    off += 6;
                    let flags = *src.get(off).ok_or(RacError::Truncated)?;
                    off += 1;
                    let codec_index = (flags & 0b0000_0111) as usize;
                    let resource_ref_count = ((flags >> 3) & 0b11) as usize;
                    let codec_tag = *codecs.get(codec_index).ok_or_else(|| {
                        RacError::MalformedIndex("leaf codec index out of range".into())
                    })?;
                    let mut resource_refs = Vec::with_capacity(resource_ref_count);
                    for _ in 0..resource_ref_count {
                        let idx = *src.get(off).ok_or(RacError::Truncated)? as usize;
                        off += 1;
                        let slot = *resource_slots.get(idx).ok_or_else(|| {
                            RacError::MalformedIndex(
                                "leaf resource reference out of range".into(),
                            )
                        })?;
                        resource_refs.push(slot);
                    }
                    let clen = read_u32(src, off)?;
                    off += 4;
                    v.push(LeafChild {
                        dptr_end,
                        cptr,
                        clen,
                        codec_tag,
                        resource_refs,
                    });
                }
                NodeChildren::Leaf(v)
            }
        };

        let trailing_len = read_u32(src, off)?;
        if trailing_len as usize != off - 4 {
            return Err(RacError::MalformedIndex(
                "trailing length marker disagrees with body length".into(),
            ));
        }
        off += 4;

        Ok((
            Node {
                drange_lo,
                resource_slots,
                children,
            },
            off,
            framing,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leaf() -> Node {
        Node {
            drange_lo: 0,
            resource_slots: vec![7],
            children: NodeChildren::Leaf(vec![
                LeafChild {
                    dptr_end: 2,
                    cptr: 100,
                    clen: 10,
                    codec_tag: 1,
                    resource_refs: vec![7],
                },
                LeafChild {
                    dptr_end: 6,
                    cptr: 110,
                    clen: 20,
                    codec_tag: 0,
                    resource_refs: vec![],
                },
            ]),
        }
    }

    #[test]
    fn leaf_roundtrips_forward() {
        let node = sample_leaf();
        let bytes = node.encode(Framing::Forward);
        let (decoded, consumed, framing) = Node::decode(&bytes).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(consumed, bytes.len());
        assert_eq!(framing, Framing::Forward);
    }

    #[test]
    fn leaf_roundtrips_backward() {
        let node = sample_leaf();
        let bytes = node.encode(Framing::Backward);
        let (decoded, _, framing) = Node::decode(&bytes).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(framing, Framing::Backward);
    }

    #[test]
    fn branch_roundtrips() {
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Branch(vec![
                BranchChild { dptr_end: 1000, cptr: 4 },
                BranchChild { dptr_end: 2000, cptr: 5000 },
            ]),
        };
        let bytes = node.encode(Framing::Forward);
        let (decoded, _, _) = Node::decode(&bytes).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.drange_hi(), 2000);
        assert_eq!(decoded.arity(), 2);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = b"xxxx".to_vec();
        assert_eq!(Node::decode(&bytes).unwrap_err(), RacError::BadMagic);
    }

    #[test]
    fn truncated_record_is_rejected_not_panicking() {
        let node = sample_leaf();
        let mut bytes = node.encode(Framing::Forward);
        bytes.truncate(bytes.len() - 3);
        assert!(Node::decode(&bytes).is_err());
    }

    #[test]
    fn tampered_trailing_length_is_detected() {
        let node = sample_leaf();
        let mut bytes = node.encode(Framing::Forward);
        let len = bytes.len();
        bytes[len - 1] ^= 0xFF;
        assert!(matches!(
            Node::decode(&bytes),
            Err(RacError::MalformedIndex(_))
        ));
    }

    #[test]
    fn declared_codec_count_caps_selectable_index() {
        // A leaf node with a single declared codec: the flags byte's codec
        // index field can only ever select codecs[0] for either child.
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Leaf(vec![
                LeafChild { dptr_end: 2, cptr: 10, clen: 2, codec_tag: 9, resource_refs: vec![] },
                LeafChild { dptr_end: 4, cptr: 20, clen: 2, codec_tag: 9, resource_refs: vec![] },
            ]),
        };
        let bytes = node.encode(Framing::Forward);
        let (decoded, _, _) = Node::decode(&bytes).unwrap();
        if let NodeChildren::Leaf(v) = decoded.children {
            assert!(v.iter().all(|c| c.codec_tag == 9));
        } else {
            panic!("expected leaf node");
        }
    }
}
