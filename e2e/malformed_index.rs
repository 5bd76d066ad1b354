//! Malformed-index and tamper-detection properties (spec §8): a structural
//! inconsistency in the index surfaces as `MalformedIndex`/`CycleInIndex`,
//! never as silently wrong decoded bytes.

use std::sync::Arc;

use rac::codec::TAG_STORE;
use rac::container::{Footer, IndexLocation, FOOTER_LEN};
use rac::error::RacError;
use rac::index::IndexReader;
use rac::node::{BranchChild, Framing, LeafChild, Node, NodeChildren};
use rac::reader::{Reader, ReaderOptions};
use rac::source::{MemorySource, RandomAccessSource};
use rac::writer::{Writer, WriterOptions};

#[test]
fn declared_drange_disagreeing_with_children_sum_is_malformed() {
    // §8 scenario 4: a node declares DRange [0,100) but its own children
    // only sum to [0,99) — the root parses, but the first leaf walk fails.
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
    let root_cptr = out.len() as u64;
    out.extend_from_slice(&node.encode(Framing::Forward));

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(out));
    let index = IndexReader::open(source, 100, root_cptr);
    assert!(index.validate().is_err());
    let err = index.iterate_leaves(0..100).next().unwrap().unwrap_err();
    assert!(matches!(err, RacError::MalformedIndex(_)));
}

#[test]
fn overlapping_leaf_dranges_fail_validation() {
    // §8 scenario 5: two leaves both effectively claim [10,20) — expressed
    // as non-strictly-ascending dptr_end values within one leaf node.
    let mut out = vec![0u8; 4];
    let node = Node {
        drange_lo: 0,
        resource_slots: vec![],
        children: NodeChildren::Leaf(vec![
            LeafChild { dptr_end: 10, cptr: 100, clen: 10, codec_tag: 0, resource_refs: vec![] },
            LeafChild { dptr_end: 20, cptr: 110, clen: 10, codec_tag: 0, resource_refs: vec![] },
            LeafChild { dptr_end: 20, cptr: 120, clen: 10, codec_tag: 0, resource_refs: vec![] },
        ]),
    };
    let root_cptr = out.len() as u64;
    out.extend_from_slice(&node.encode(Framing::Forward));

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(out));
    let index = IndexReader::open(source, 20, root_cptr);
    assert!(index.validate().is_err());
    let err = index.iterate_leaves(0..20).next().unwrap().unwrap_err();
    assert!(matches!(err, RacError::MalformedIndex(_)));
}

#[test]
fn self_referential_child_cptr_is_a_cycle_not_an_infinite_loop() {
    let mut out = vec![0u8; 4];
    let root_cptr = out.len() as u64;
    let node = Node {
        drange_lo: 0,
        resource_slots: vec![],
        children: NodeChildren::Branch(vec![BranchChild { dptr_end: 10, cptr: root_cptr }]),
    };
    out.extend_from_slice(&node.encode(Framing::Forward));

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(out));
    let index = IndexReader::open(source, 10, root_cptr);
    assert_eq!(
        index.iterate_leaves(0..10).next().unwrap().unwrap_err(),
        RacError::CycleInIndex
    );
}

fn build_file(payload: &[u8], d_chunk_size: u64) -> Vec<u8> {
    let options = WriterOptions {
        codec_tag: TAG_STORE,
        d_chunk_size,
        index_location: IndexLocation::End,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(payload).unwrap();
    writer.close().unwrap()
}

#[test]
fn tampering_the_reserved_checksum_field_does_not_affect_decode() {
    // §9 open question: the reserved checksum is never trusted for
    // integrity, so flipping it is "an unaffected field" (§8's tamper
    // property) and decode must reproduce the original bytes.
    let payload = b"the reserved checksum field is never trusted for integrity".to_vec();
    let mut bytes = build_file(&payload, 8);

    let footer_start = bytes.len() - FOOTER_LEN;
    bytes[footer_start + 12] ^= 0xFF;
    Footer::decode(&bytes[footer_start..]).expect("reserved checksum is not magic-checked");

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    assert_eq!(reader.read_all().unwrap(), payload);
    reader.close();
}

#[test]
fn tampering_the_node_trailing_length_marker_surfaces_a_structural_error() {
    // The trailing length marker is the last 4 bytes of the root node's
    // on-disk record, immediately before the footer. Flipping a byte in it
    // must surface `MalformedIndex`, never silently-wrong decoded output.
    let payload = b"tamper test payload for the trailing length marker check!!".to_vec();
    let mut bytes = build_file(&payload, 8);

    let node_record_end = bytes.len() - FOOTER_LEN;
    bytes[node_record_end - 1] ^= 0xFF;

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    let err = reader.read_all().unwrap_err();
    assert!(matches!(err, RacError::MalformedIndex(_)));
}
