//! Round-trip property (spec §8): `decode(encode(S)) == S` across codecs,
//! chunking policies, and index locations.

use std::sync::Arc;

use rac::codec::{TAG_LZ4_BLOCK, TAG_STORE};
use rac::container::IndexLocation;
use rac::reader::{Reader, ReaderOptions};
use rac::source::{MemorySource, RandomAccessSource};
use rac::writer::{Writer, WriterOptions};

fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random()).collect()
}

fn encode_then_decode(
    payload: &[u8],
    codec_tag: u8,
    d_chunk_size: u64,
    c_chunk_size: u64,
    index_location: IndexLocation,
) -> Vec<u8> {
    let options = WriterOptions {
        codec_tag,
        d_chunk_size,
        c_chunk_size,
        index_location,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(payload).unwrap();
    let bytes = writer.close().unwrap();

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    let out = reader.read_all().unwrap();
    reader.close();
    out
}

#[test]
fn round_trips_across_codecs_chunk_policies_and_index_locations() {
    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        b"the quick brown fox jumps over the lazy dog".to_vec(),
        vec![0u8; 10_000],
        random_bytes(50_000, 1),
        random_bytes(200_000, 2),
    ];

    for payload in &payloads {
        for &codec_tag in &[TAG_STORE, TAG_LZ4_BLOCK] {
            for &(d, c) in &[(16u64, 0u64), (0, 32), (4096, 0)] {
                for &loc in &[IndexLocation::End, IndexLocation::Start] {
                    let out = encode_then_decode(payload, codec_tag, d, c, loc);
                    assert_eq!(
                        &out,
                        payload,
                        "codec={codec_tag} d_chunk_size={d} c_chunk_size={c} index_location={loc:?} len={}",
                        payload.len()
                    );
                }
            }
        }
    }
}

#[test]
fn multiple_writes_before_close_round_trip_as_one_stream() {
    let options = WriterOptions {
        codec_tag: TAG_LZ4_BLOCK,
        d_chunk_size: 11,
        index_location: IndexLocation::End,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(&b"first segment, "[..]).unwrap();
    writer.write(&b"second segment, "[..]).unwrap();
    writer.write(&b"and a third."[..]).unwrap();
    let bytes = writer.close().unwrap();

    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    assert_eq!(
        reader.read_all().unwrap(),
        b"first segment, second segment, and a third.".to_vec()
    );
    reader.close();
}
