//! Index reader (§4.2): loads and validates nodes on demand, enforces the
//! §3 invariants across the tree, and resolves DSpace offsets to leaves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use super::LeafEntry;
use crate::config::MAX_TREE_DEPTH;
use crate::error::{RacError, RacResult};
use crate::node::{Node, NodeChildren};
use crate::primitive::{CPtr, DPtr};
use crate::source::RandomAccessSource;

/// Smallest plausible node record (magic + kind + arity + 2 count bytes +
/// drange_lo + trailing length). Used as the first read-ahead guess in
/// `get_node`; wrong guesses just grow and retry.
const NODE_READ_GUESS: usize = 256;
const NODE_READ_MAX: usize = 1 << 24;

struct CacheEntry {
    node: Node,
    self_check: OnceLock<RacResult<()>>,
}

/// Loads nodes lazily from a compressed-byte source and caches them for the
/// reader's lifetime (§3: "read-only after the file is closed").
pub struct IndexReader {
    source: Arc<dyn RandomAccessSource>,
    d_file_size: DPtr,
    root_cptr: CPtr,
    cache: Mutex<HashMap<CPtr, Arc<CacheEntry>>>,
}

/// Result of `locate`: either a leaf covering the offset, or the
/// end-of-stream sentinel for `dOffset >= DFileSize` (§4.2).
pub enum Locate {
    Found { leaf: LeafEntry, offset_within: u64 },
    Eof,
}

impl IndexReader {
    /// `open(src, compressedSize)` as described in §4.2. The footer has
    /// already been read by the caller (`Reader::open`); this just takes
    /// the two values it yielded.
    pub fn open(source: Arc<dyn RandomAccessSource>, d_file_size: DPtr, root_cptr: CPtr) -> Self {
        IndexReader {
            source,
            d_file_size,
            root_cptr,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root_drange(&self) -> std::ops::Range<DPtr> {
        0..self.d_file_size
    }

    pub fn d_file_size(&self) -> DPtr {
        self.d_file_size
    }

    fn is_empty_file(&self) -> bool {
        self.d_file_size == 0
    }

    /// Reads and decodes the node at `cptr`, growing the read-ahead window
    /// until the record fits or the source is exhausted. Cached by `cptr`
    /// for the reader's lifetime — "a one-shot initialization guard per
    /// node suffices" (§5).
    fn get_node(&self, cptr: CPtr) -> RacResult<Arc<CacheEntry>> {
        if let Some(hit) = self.cache.lock().expect("index cache poisoned").get(&cptr) {
            return Ok(Arc::clone(hit));
        }

        let mut want = NODE_READ_GUESS;
        let node = loop {
            let mut buf = vec![0u8; want];
            let n = self.source.read_at(cptr, &mut buf)?;
            buf.truncate(n);
            match Node::decode(&buf) {
                Ok((node, _, _)) => break node,
                Err(RacError::Truncated) if want < NODE_READ_MAX && n == want => {
                    want *= 2;
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        let entry = Arc::new(CacheEntry {
            node,
            self_check: OnceLock::new(),
        });
        self.cache
            .lock()
            .expect("index cache poisoned")
            .insert(cptr, Arc::clone(&entry));
        Ok(entry)
    }

    /// Validates a node's internal shape once (ascending DPtr order per
    /// child, §3 invariants 1 and 6) and caches the result.
    fn self_check(&self, entry: &CacheEntry) -> RacResult<()> {
        entry
            .self_check
            .get_or_init(|| {
                let mut prev = entry.node.drange_lo;
                let ends: Vec<DPtr> = match &entry.node.children {
                    NodeChildren::Branch(v) => v.iter().map(|c| c.dptr_end).collect(),
                    NodeChildren::Leaf(v) => v.iter().map(|c| c.dptr_end).collect(),
                };
                for end in ends {
                    if end <= prev {
                        return Err(RacError::MalformedIndex(
                            "child DPtr values are not strictly ascending".into(),
                        ));
                    }
                    prev = end;
                }
                Ok(())
            })
            .clone()
    }

    /// `locate(dOffset)` (§4.2).
    pub fn locate(&self, d_offset: DPtr) -> RacResult<Locate> {
        if d_offset >= self.d_file_size {
            return Ok(Locate::Eof);
        }
        let mut it = self.iterate_leaves(d_offset..d_offset + 1);
        match it.next() {
            Some(Ok(leaf)) => {
                let offset_within = d_offset - leaf.d_range.start;
                Ok(Locate::Found { leaf, offset_within })
            }
            Some(Err(e)) => Err(e),
            None => Err(RacError::MalformedIndex(
                "no leaf covers a requested in-bounds offset".into(),
            )),
        }
    }

    /// `iterateLeaves(dRange)` (§4.2): lazy, ascending-DPtr-order DFS that
    /// only descends into subtrees intersecting `want`.
    pub fn iterate_leaves(&self, want: std::ops::Range<DPtr>) -> LeafIter<'_> {
        let root_pending = !self.is_empty_file() && want.start < want.end && want.start < self.d_file_size;
        LeafIter {
            reader: self,
            want,
            stack: Vec::new(),
            root_pending,
            done: false,
        }
    }

    /// Validates the whole reachable tree against `[0, DFileSize)` and
    /// checks full, gapless, non-overlapping leaf coverage (§3 invariants
    /// 1-4, exercised together since our wire format makes a partial
    /// structural check insufficient on its own).
    pub fn validate(&self) -> RacResult<()> {
        let mut expect = 0u64;
        for leaf in self.iterate_leaves(self.root_drange()) {
            let leaf = leaf?;
            if leaf.d_range.start != expect {
                return Err(RacError::MalformedIndex(
                    "leaf coverage has a gap or overlap".into(),
                ));
            }
            expect = leaf.d_range.end;
        }
        if expect != self.d_file_size {
            return Err(RacError::MalformedIndex(
                "leaf coverage does not reach DFileSize".into(),
            ));
        }
        Ok(())
    }
}

enum Frame {
    Branch {
        cptr: CPtr,
        entry: Arc<CacheEntry>,
        lo: DPtr,
        next_child: usize,
    },
    Leaf {
        entry: Arc<CacheEntry>,
        lo: DPtr,
        next_child: usize,
    },
}

enum PendingFrame {
    Root,
    Child { parent_cptr: CPtr, cptr: CPtr, lo: DPtr, hi: DPtr },
}

pub struct LeafIter<'a> {
    reader: &'a IndexReader,
    want: std::ops::Range<DPtr>,
    stack: Vec<Frame>,
    root_pending: bool,
    done: bool,
}

impl<'a> LeafIter<'a> {
    fn push(&mut self, pending: PendingFrame) -> RacResult<()> {
        if self.stack.len() as u32 >= MAX_TREE_DEPTH {
            return Err(RacError::DepthLimitExceeded);
        }
        let (cptr, lo, hi, parent_cptr) = match pending {
            PendingFrame::Root => (self.reader.root_cptr, 0, self.reader.d_file_size, None),
            PendingFrame::Child { parent_cptr, cptr, lo, hi } => (cptr, lo, hi, Some(parent_cptr)),
        };
        if let Some(parent) = parent_cptr {
            if cptr <= parent {
                return Err(RacError::CycleInIndex);
            }
        }
        let entry = self.reader.get_node(cptr)?;
        self.reader.self_check(&entry)?;
        if entry.node.drange_lo != lo || entry.node.drange_hi() != hi {
            return Err(RacError::MalformedIndex(
                "node DRange disagrees with its parent-assigned range".into(),
            ));
        }
        match &entry.node.children {
            NodeChildren::Branch(_) => self.stack.push(Frame::Branch { cptr, entry, lo, next_child: 0 }),
            NodeChildren::Leaf(_) => self.stack.push(Frame::Leaf { entry, lo, next_child: 0 }),
        }
        Ok(())
    }
}

impl<'a> Iterator for LeafIter<'a> {
    type Item = RacResult<LeafEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.root_pending {
            self.root_pending = false;
            if let Err(e) = self.push(PendingFrame::Root) {
                self.done = true;
                return Some(Err(e));
            }
        }
        if self.stack.is_empty() {
            self.done = true;
            return None;
        }

        loop {
            let step = match self.stack.last_mut() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Frame::Branch { cptr, entry, lo, next_child }) => {
                    let NodeChildren::Branch(children) = &entry.node.children else {
                        unreachable!()
                    };
                    if *next_child >= children.len() {
                        Step::Pop
                    } else {
                        let idx = *next_child;
                        *next_child += 1;
                        let child_lo = if idx == 0 { *lo } else { children[idx - 1].dptr_end };
                        let child = &children[idx];
                        Step::Descend {
                            parent_cptr: *cptr,
                            cptr: child.cptr,
                            lo: child_lo,
                            hi: child.dptr_end,
                        }
                    }
                }
                Some(Frame::Leaf { entry, lo, next_child }) => {
                    let NodeChildren::Leaf(children) = &entry.node.children else {
                        unreachable!()
                    };
                    if *next_child >= children.len() {
                        Step::Pop
                    } else {
                        let idx = *next_child;
                        *next_child += 1;
                        let child_lo = if idx == 0 { *lo } else { children[idx - 1].dptr_end };
                        let child = &children[idx];
                        Step::Yield(LeafEntry {
                            d_range: child_lo..child.dptr_end,
                            c_range: child.cptr..(child.cptr + child.clen as u64),
                            codec_tag: child.codec_tag,
                            resources: child.resource_refs.clone(),
                        })
                    }
                }
            };

            match step {
                Step::Pop => {
                    self.stack.pop();
                }
                Step::Descend { parent_cptr, cptr, lo, hi } => {
                    if hi <= self.want.start || lo >= self.want.end {
                        continue;
                    }
                    match self.push(PendingFrame::Child { parent_cptr, cptr, lo, hi }) {
                        Ok(()) => {}
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                Step::Yield(leaf) => {
                    if leaf.d_range.end <= self.want.start || leaf.d_range.start >= self.want.end {
                        continue;
                    }
                    return Some(Ok(leaf));
                }
            }
        }
    }
}

enum Step {
    Pop,
    Descend { parent_cptr: CPtr, cptr: CPtr, lo: DPtr, hi: DPtr },
    Yield(LeafEntry),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BranchChild, Framing, LeafChild, Node, NodeChildren};
    use crate::source::MemorySource;

    /// Three leaf chunks [0,2) [2,4) [4,6), matching §8 scenario 1's shape.
    fn three_leaf_file() -> (Vec<u8>, DPtr, CPtr) {
        let mut out = vec![0u8; 4]; // file magic placeholder, unchecked by IndexReader itself
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Leaf(vec![
                LeafChild { dptr_end: 2, cptr: 100, clen: 2, codec_tag: 0, resource_refs: vec![] },
                LeafChild { dptr_end: 4, cptr: 102, clen: 2, codec_tag: 0, resource_refs: vec![] },
                LeafChild { dptr_end: 6, cptr: 104, clen: 2, codec_tag: 0, resource_refs: vec![] },
            ]),
        };
        let root_cptr = out.len() as CPtr;
        out.extend_from_slice(&node.encode(Framing::Forward));
        (out, 6, root_cptr)
    }

    fn reader_for(bytes: Vec<u8>, d_file_size: DPtr, root_cptr: CPtr) -> IndexReader {
        IndexReader::open(Arc::new(MemorySource::new(bytes)), d_file_size, root_cptr)
    }

    #[test]
    fn iterate_leaves_covers_full_range_in_order() {
        let (bytes, size, root) = three_leaf_file();
        let reader = reader_for(bytes, size, root);
        let leaves: Vec<_> = reader.iterate_leaves(0..size).map(|l| l.unwrap()).collect();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].d_range, 0..2);
        assert_eq!(leaves[1].d_range, 2..4);
        assert_eq!(leaves[2].d_range, 4..6);
    }

    #[test]
    fn iterate_leaves_clips_to_intersecting_subset() {
        let (bytes, size, root) = three_leaf_file();
        let reader = reader_for(bytes, size, root);
        let leaves: Vec<_> = reader.iterate_leaves(1..5).map(|l| l.unwrap()).collect();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].d_range, 0..2);
        assert_eq!(leaves[2].d_range, 4..6);
    }

    #[test]
    fn locate_resolves_boundary_to_next_child() {
        let (bytes, size, root) = three_leaf_file();
        let reader = reader_for(bytes, size, root);
        match reader.locate(2).unwrap() {
            Locate::Found { leaf, offset_within } => {
                assert_eq!(leaf.d_range, 2..4);
                assert_eq!(offset_within, 0);
            }
            Locate::Eof => panic!("expected Found"),
        }
    }

    #[test]
    fn locate_past_end_is_eof_sentinel() {
        let (bytes, size, root) = three_leaf_file();
        let reader = reader_for(bytes, size, root);
        assert!(matches!(reader.locate(size).unwrap(), Locate::Eof));
        assert!(matches!(reader.locate(size + 100).unwrap(), Locate::Eof));
    }

    #[test]
    fn validate_accepts_well_formed_tree() {
        let (bytes, size, root) = three_leaf_file();
        let reader = reader_for(bytes, size, root);
        assert!(reader.validate().is_ok());
    }

    #[test]
    fn empty_file_yields_no_leaves() {
        let reader = reader_for(vec![0u8; 4], 0, 0);
        assert_eq!(reader.iterate_leaves(0..0).count(), 0);
        assert!(reader.validate().is_ok());
    }

    #[test]
    fn mismatched_declared_drange_is_malformed() {
        // Scenario 4: a node whose declared DRange disagrees with its
        // parent-assigned range (here: root itself, against DFileSize).
        let mut out = vec![0u8; 4];
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Leaf(vec![LeafChild {
                dptr_end: 99,
                cptr: 100,
                clen: 10,
                codec_tag: 0,
                resource_refs: vec![],
            }]),
        };
        let root_cptr = out.len() as CPtr;
        out.extend_from_slice(&node.encode(Framing::Forward));
        // Footer claims DFileSize=100 but the root node only covers [0,99).
        let reader = reader_for(out, 100, root_cptr);
        assert!(reader.iterate_leaves(0..100).next().unwrap().is_err());
    }

    #[test]
    fn non_ascending_children_is_malformed() {
        // Scenario 5's overlap, expressed as a branch whose children are
        // not in strictly ascending DPtr order (§3 invariant 6).
        let mut out = vec![0u8; 4];
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Branch(vec![
                BranchChild { dptr_end: 20, cptr: 200 },
                BranchChild { dptr_end: 20, cptr: 300 },
            ]),
        };
        let root_cptr = out.len() as CPtr;
        out.extend_from_slice(&node.encode(Framing::Forward));
        let reader = reader_for(out, 20, root_cptr);
        assert!(reader.iterate_leaves(0..20).next().unwrap().is_err());
    }

    #[test]
    fn self_referential_cptr_is_cycle() {
        let mut out = vec![0u8; 4];
        let root_cptr = out.len() as CPtr;
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Branch(vec![BranchChild { dptr_end: 10, cptr: root_cptr }]),
        };
        out.extend_from_slice(&node.encode(Framing::Forward));
        let reader = reader_for(out, 10, root_cptr);
        assert_eq!(
            reader.iterate_leaves(0..10).next().unwrap().unwrap_err(),
            RacError::CycleInIndex
        );
    }
}
