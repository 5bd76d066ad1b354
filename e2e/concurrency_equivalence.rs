//! Concurrency equivalence (spec §8): for all `W ∈ {1, 2, 4, 16}`, reader
//! output is independent of the worker count.

use std::sync::Arc;

use rac::codec::TAG_LZ4_BLOCK;
use rac::container::IndexLocation;
use rac::reader::{Reader, ReaderOptions};
use rac::source::{MemorySource, RandomAccessSource};
use rac::writer::{Writer, WriterOptions};

fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random()).collect()
}

#[test]
fn reader_output_is_independent_of_worker_count() {
    let payload = random_bytes(100_000, 31);
    let options = WriterOptions {
        codec_tag: TAG_LZ4_BLOCK,
        d_chunk_size: 4096,
        index_location: IndexLocation::End,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(&payload[..]).unwrap();
    let bytes = writer.close().unwrap();

    for &workers in &[1usize, 2, 4, 16] {
        let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes.clone()));
        let reader = Reader::open(
            source,
            ReaderOptions { workers, ..ReaderOptions::default() },
        )
        .unwrap();
        let out = reader.read_all().unwrap();
        reader.close();
        assert_eq!(out, payload, "workers={workers}");
    }
}

#[test]
fn partial_range_output_is_independent_of_worker_count() {
    let payload = random_bytes(60_000, 32);
    let options = WriterOptions {
        codec_tag: TAG_LZ4_BLOCK,
        d_chunk_size: 777,
        index_location: IndexLocation::End,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(&payload[..]).unwrap();
    let bytes = writer.close().unwrap();

    let (lo, hi) = (1234u64, 45_000u64);
    for &workers in &[1usize, 2, 4, 16] {
        let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes.clone()));
        let reader = Reader::open(
            source,
            ReaderOptions { workers, ..ReaderOptions::default() },
        )
        .unwrap();
        let mut range_reader = reader.seek_range(lo, hi).unwrap();
        let mut out = vec![0u8; (hi - lo) as usize];
        let mut total = 0;
        loop {
            let (n, status) = range_reader.read(&mut out[total..]).unwrap();
            total += n;
            if status == rac::engine::ReadStatus::Eof {
                break;
            }
        }
        reader.close();
        assert_eq!(&out[..total], &payload[lo as usize..hi as usize], "workers={workers}");
    }
}
