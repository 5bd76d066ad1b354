//! Index location equivalence (spec §8):
//! `decode(encode(S, IndexLocation=Start)) == decode(encode(S, IndexLocation=End))`.

use std::sync::Arc;

use rac::codec::TAG_LZ4_BLOCK;
use rac::container::IndexLocation;
use rac::reader::{Reader, ReaderOptions};
use rac::source::{MemorySource, RandomAccessSource};
use rac::writer::{TempStorageKind, Writer, WriterOptions};

fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random()).collect()
}

fn encode_with(payload: &[u8], loc: IndexLocation, temp: TempStorageKind) -> Vec<u8> {
    let options = WriterOptions {
        codec_tag: TAG_LZ4_BLOCK,
        d_chunk_size: 37,
        index_location: loc,
        temp_storage: temp,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(payload).unwrap();
    writer.close().unwrap()
}

fn decode_all(bytes: Vec<u8>) -> Vec<u8> {
    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    let out = reader.read_all().unwrap();
    reader.close();
    out
}

#[test]
fn start_and_end_index_locations_decode_identically() {
    let payload = random_bytes(20_000, 3);
    let end_bytes = encode_with(&payload, IndexLocation::End, TempStorageKind::InMemory);
    let start_bytes = encode_with(&payload, IndexLocation::Start, TempStorageKind::InMemory);

    assert_ne!(end_bytes, start_bytes, "the two layouts place bytes differently");
    assert_eq!(decode_all(end_bytes), payload);
    assert_eq!(decode_all(start_bytes), payload);
}

#[test]
fn start_location_on_disk_temp_storage_matches_in_memory() {
    let payload = b"small file exercising the on-disk temp storage backing".to_vec();
    let in_memory = encode_with(&payload, IndexLocation::Start, TempStorageKind::InMemory);
    let on_disk = encode_with(&payload, IndexLocation::Start, TempStorageKind::OnDisk);

    assert_eq!(decode_all(in_memory), payload);
    assert_eq!(decode_all(on_disk), payload);
}

#[test]
fn empty_input_is_equivalent_across_index_locations() {
    let payload: Vec<u8> = Vec::new();
    let end_bytes = encode_with(&payload, IndexLocation::End, TempStorageKind::InMemory);
    let start_bytes = encode_with(&payload, IndexLocation::Start, TempStorageKind::InMemory);
    assert_eq!(decode_all(end_bytes), payload);
    assert_eq!(decode_all(start_bytes), payload);
}
