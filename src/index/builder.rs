//! Index writer / builder (§4.5): buffers leaf descriptors produced during
//! encoding and, at close, flushes them as a hierarchical index either
//! before (`IndexLocation::Start`) or after (`IndexLocation::End`) the
//! chunk data.

use std::collections::HashMap;
use std::io::Write;

use crate::config::MAX_ARITY;
use crate::container::FILE_MAGIC;
use crate::error::RacResult;
use crate::node::{BranchChild, Framing, LeafChild, Node, NodeChildren};
use crate::primitive::{CPtr, DPtr};

const FUSE_AT: usize = MAX_ARITY as usize;

/// An in-memory, not-yet-serialized node. Building this tree is pure
/// bookkeeping — no bytes are written until `IndexBuilder::finish` hands
/// the root to one of the `flush_*` functions.
pub(crate) enum PendingNode {
    Leaf { drange_lo: DPtr, children: Vec<LeafChild> },
    Branch { drange_lo: DPtr, children: Vec<(DPtr, Box<PendingNode>)> },
}

impl PendingNode {
    fn drange_lo(&self) -> DPtr {
        match self {
            PendingNode::Leaf { drange_lo, .. } => *drange_lo,
            PendingNode::Branch { drange_lo, .. } => *drange_lo,
        }
    }

    fn drange_hi(&self) -> DPtr {
        match self {
            PendingNode::Leaf { children, .. } => children.last().expect("arity >= 1").dptr_end,
            PendingNode::Branch { children, .. } => children.last().expect("arity >= 1").0,
        }
    }
}

#[derive(Default)]
struct Level {
    lo: DPtr,
    entries: Vec<(DPtr, Box<PendingNode>)>,
}

/// Accumulates leaf descriptors and fuses them into a height-minimal tree
/// as described in §4.5, without ever writing bytes until `finish`.
pub struct IndexBuilder {
    level0: Vec<LeafChild>,
    level0_lo: DPtr,
    cursor: DPtr,
    levels: Vec<Level>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        IndexBuilder {
            level0: Vec::new(),
            level0_lo: 0,
            cursor: 0,
            levels: Vec::new(),
        }
    }

    /// Records one leaf-child descriptor `(dLen, cLen, codecTag,
    /// resourceIndices, chunkCPtr)`, expressed here as a `LeafChild`
    /// (§4.1's own per-child record, reused rather than duplicated).
    pub fn push_leaf(&mut self, child: LeafChild) {
        if self.level0.is_empty() {
            self.level0_lo = self.cursor;
        }
        self.cursor = child.dptr_end;
        self.level0.push(child);
        if self.level0.len() == FUSE_AT {
            let node = PendingNode::Leaf {
                drange_lo: self.level0_lo,
                children: std::mem::take(&mut self.level0),
            };
            let hi = node.drange_hi();
            self.push_branch(0, hi, Box::new(node));
        }
    }

    fn push_branch(&mut self, level: usize, dptr_end: DPtr, node: Box<PendingNode>) {
        while self.levels.len() <= level {
            self.levels.push(Level::default());
        }
        let lo = node.drange_lo();
        let lvl = &mut self.levels[level];
        if lvl.entries.is_empty() {
            lvl.lo = lo;
        }
        lvl.entries.push((dptr_end, node));
        if lvl.entries.len() == FUSE_AT {
            let entries = std::mem::take(&mut lvl.entries);
            let fused_lo = lvl.lo;
            let fused = PendingNode::Branch { drange_lo: fused_lo, children: entries };
            self.push_branch(level + 1, dptr_end, Box::new(fused));
        }
    }

    /// Fuses every remaining partial group, bottom-up, into a single root
    /// node. Returns `None` for the empty-file sentinel (no leaves pushed
    /// at all).
    pub(crate) fn finish(mut self) -> Option<PendingNode> {
        let mut carry: Option<Box<PendingNode>> = if self.level0.is_empty() {
            None
        } else {
            Some(Box::new(PendingNode::Leaf {
                drange_lo: self.level0_lo,
                children: std::mem::take(&mut self.level0),
            }))
        };

        for level in 0..self.levels.len() {
            let lvl = &mut self.levels[level];
            if let Some(node) = carry.take() {
                let dptr_end = node.drange_hi();
                if lvl.entries.is_empty() {
                    lvl.lo = node.drange_lo();
                }
                lvl.entries.push((dptr_end, node));
            }
            if lvl.entries.is_empty() {
                continue;
            }
            let entries = std::mem::take(&mut lvl.entries);
            carry = Some(Box::new(PendingNode::Branch { drange_lo: lvl.lo, children: entries }));
        }

        let mut root = carry?;
        // Collapse singleton branch chains so the tree stays height-minimal.
        loop {
            match *root {
                PendingNode::Branch { children, .. } if children.len() == 1 => {
                    let (_, only) = children.into_iter().next().unwrap();
                    root = only;
                }
                other => {
                    root = Box::new(other);
                    break;
                }
            }
        }
        Some(*root)
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_resource_slots(children: &[LeafChild]) -> Vec<u32> {
    let mut slots = Vec::new();
    for c in children {
        for &r in &c.resource_refs {
            if !slots.contains(&r) {
                slots.push(r);
            }
        }
    }
    slots
}

/// `IndexLocation::End`: chunks are already at their final absolute offset
/// in `out`. Nodes are serialized bottom-up, each one's CPtr being simply
/// `out`'s length at the moment it is appended — no precomputation needed.
pub(crate) fn flush_end<W: Write>(root: &PendingNode, out: &mut W, mut cursor: CPtr) -> RacResult<CPtr> {
    emit_end(root, out, &mut cursor)
}

fn emit_end<W: Write>(node: &PendingNode, out: &mut W, cursor: &mut CPtr) -> RacResult<CPtr> {
    let concrete = match node {
        PendingNode::Leaf { drange_lo, children } => Node {
            drange_lo: *drange_lo,
            resource_slots: collect_resource_slots(children),
            children: NodeChildren::Leaf(children.clone()),
        },
        PendingNode::Branch { drange_lo, children } => {
            let mut resolved = Vec::with_capacity(children.len());
            for (dptr_end, child) in children {
                let cptr = emit_end(child, out, cursor)?;
                resolved.push(BranchChild { dptr_end: *dptr_end, cptr });
            }
            Node {
                drange_lo: *drange_lo,
                resource_slots: vec![],
                children: NodeChildren::Branch(resolved),
            }
        }
    };
    let bytes = concrete.encode(Framing::Backward);
    let my_cptr = *cursor;
    out.write_all(&bytes)?;
    *cursor += bytes.len() as u64;
    Ok(my_cptr)
}

/// `IndexLocation::Start`: chunks live at TempStorage-local offsets that
/// need a final shift once the whole index's footprint is known, so
/// layout is two-pass: compute every node's size (independent of the
/// actual CPtr values it will end up holding, since CPtr is a fixed-width
/// field), assign root-first offsets, then serialize.
pub(crate) fn flush_start<W: Write>(root: &PendingNode, out: &mut W) -> RacResult<(CPtr, CPtr)> {
    let mut order: Vec<&PendingNode> = Vec::new();
    preorder_collect(root, &mut order);

    let sizes: Vec<usize> = order.iter().map(|n| node_size(n)).collect();
    let total: usize = sizes.iter().sum();

    let mut offsets: HashMap<*const PendingNode, CPtr> = HashMap::with_capacity(order.len());
    let mut acc = FILE_MAGIC.len() as CPtr;
    for (n, sz) in order.iter().zip(&sizes) {
        offsets.insert(*n as *const PendingNode, acc);
        acc += *sz as CPtr;
    }
    let leaf_shift = FILE_MAGIC.len() as CPtr + total as CPtr;

    for n in &order {
        let concrete = materialize(n, leaf_shift, &offsets);
        out.write_all(&concrete.encode(Framing::Forward))?;
    }

    let root_cptr = *offsets
        .get(&(root as *const PendingNode))
        .expect("root was included in preorder walk");
    Ok((root_cptr, leaf_shift))
}

fn preorder_collect<'a>(node: &'a PendingNode, out: &mut Vec<&'a PendingNode>) {
    out.push(node);
    if let PendingNode::Branch { children, .. } = node {
        for (_, child) in children {
            preorder_collect(child, out);
        }
    }
}

fn node_size(node: &PendingNode) -> usize {
    match node {
        PendingNode::Leaf { drange_lo, children } => Node {
            drange_lo: *drange_lo,
            resource_slots: collect_resource_slots(children),
            children: NodeChildren::Leaf(children.clone()),
        }
        .encode(Framing::Forward)
        .len(),
        PendingNode::Branch { drange_lo, children } => {
            let placeholder: Vec<BranchChild> = children
                .iter()
                .map(|(dptr_end, _)| BranchChild { dptr_end: *dptr_end, cptr: 0 })
                .collect();
            Node {
                drange_lo: *drange_lo,
                resource_slots: vec![],
                children: NodeChildren::Branch(placeholder),
            }
            .encode(Framing::Forward)
            .len()
        }
    }
}

fn materialize(node: &PendingNode, leaf_shift: CPtr, offsets: &HashMap<*const PendingNode, CPtr>) -> Node {
    match node {
        PendingNode::Leaf { drange_lo, children } => {
            let resource_slots = collect_resource_slots(children);
            let shifted = children
                .iter()
                .map(|c| LeafChild { cptr: c.cptr + leaf_shift, ..c.clone() })
                .collect();
            Node { drange_lo: *drange_lo, resource_slots, children: NodeChildren::Leaf(shifted) }
        }
        PendingNode::Branch { drange_lo, children } => {
            let resolved = children
                .iter()
                .map(|(dptr_end, child)| {
                    let cptr = *offsets
                        .get(&(child.as_ref() as *const PendingNode))
                        .expect("offset computed for every node in the preorder walk");
                    BranchChild { dptr_end: *dptr_end, cptr }
                })
                .collect();
            Node { drange_lo: *drange_lo, resource_slots: vec![], children: NodeChildren::Branch(resolved) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(dptr_end: DPtr, cptr: CPtr, clen: u32) -> LeafChild {
        LeafChild { dptr_end, cptr, clen, codec_tag: 0, resource_refs: vec![] }
    }

    #[test]
    fn small_run_produces_single_leaf_root() {
        let mut b = IndexBuilder::new();
        b.push_leaf(leaf(2, 100, 2));
        b.push_leaf(leaf(4, 102, 2));
        let root = b.finish().unwrap();
        assert!(matches!(root, PendingNode::Leaf { .. }));
        assert_eq!(root.drange_lo(), 0);
        assert_eq!(root.drange_hi(), 4);
    }

    #[test]
    fn fusing_at_arity_cap_produces_branch_root() {
        let mut b = IndexBuilder::new();
        for i in 0..(FUSE_AT * 2 + 3) {
            let end = (i as DPtr + 1) * 10;
            b.push_leaf(leaf(end, i as CPtr * 10, 10));
        }
        let root = b.finish().unwrap();
        assert!(matches!(root, PendingNode::Branch { .. }));
        assert_eq!(root.drange_lo(), 0);
        assert_eq!(root.drange_hi(), (FUSE_AT * 2 + 3) as DPtr * 10);
    }

    #[test]
    fn empty_builder_has_no_root() {
        let b = IndexBuilder::new();
        assert!(b.finish().is_none());
    }

    #[test]
    fn flush_end_roundtrips_through_index_reader() {
        use crate::index::reader::IndexReader;
        use crate::source::MemorySource;
        use std::sync::Arc;

        let mut b = IndexBuilder::new();
        for i in 0..(FUSE_AT + 5) {
            let end = (i as DPtr + 1) * 10;
            b.push_leaf(leaf(end, i as CPtr * 10 + 1000, 10));
        }
        let root = b.finish().unwrap();
        let d_file_size = root.drange_hi();

        let mut out = Vec::new();
        let root_cptr = flush_end(&root, &mut out, 5000).unwrap();

        let reader = IndexReader::open(Arc::new(MemorySource::new(out)), d_file_size, root_cptr);
        let leaves: Vec<_> = reader.iterate_leaves(0..d_file_size).map(|l| l.unwrap()).collect();
        assert_eq!(leaves.len(), FUSE_AT + 5);
        assert_eq!(leaves[0].d_range.start, 0);
        assert_eq!(leaves.last().unwrap().d_range.end, d_file_size);
    }

    #[test]
    fn flush_start_roundtrips_through_index_reader() {
        use crate::index::reader::IndexReader;
        use crate::source::MemorySource;
        use std::sync::Arc;

        let mut b = IndexBuilder::new();
        for i in 0..(FUSE_AT + 5) {
            let end = (i as DPtr + 1) * 10;
            // Start mode: cptr is TempStorage-local, small offsets.
            b.push_leaf(leaf(end, i as CPtr * 10, 10));
        }
        let root = b.finish().unwrap();
        let d_file_size = root.drange_hi();

        let mut index_region = FILE_MAGIC.to_vec();
        let (root_cptr, leaf_shift) = flush_start(&root, &mut index_region).unwrap();
        assert_eq!(leaf_shift, index_region.len() as CPtr);

        // Simulate copying TempStorage (chunk bytes) after the index region.
        let mut file = index_region;
        file.resize(file.len() + (FUSE_AT + 5) * 10, 0xAB);

        let reader = IndexReader::open(Arc::new(MemorySource::new(file)), d_file_size, root_cptr);
        let leaves: Vec<_> = reader.iterate_leaves(0..d_file_size).map(|l| l.unwrap()).collect();
        assert_eq!(leaves.len(), FUSE_AT + 5);
        for (i, leaf) in leaves.iter().enumerate() {
            assert_eq!(leaf.c_range.start, i as CPtr * 10 + leaf_shift);
        }
    }
}
