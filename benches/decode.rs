//! Decode throughput across worker counts and chunk sizes.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
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

fn encode(payload: &[u8], d_chunk_size: u64) -> Vec<u8> {
    let options = WriterOptions {
        codec_tag: TAG_LZ4_BLOCK,
        d_chunk_size,
        index_location: IndexLocation::End,
        ..WriterOptions::default()
    };
    let mut writer = Writer::open(Vec::new(), options).unwrap();
    writer.write(payload).unwrap();
    writer.close().unwrap()
}

fn bench_worker_counts(c: &mut Criterion) {
    let payload = random_bytes(8 << 20, 42);
    let bytes = encode(&payload, 1 << 16);

    let mut group = c.benchmark_group("decode_full_file_by_workers");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes.clone()));
                let reader = Reader::open(
                    source,
                    ReaderOptions { workers, ..ReaderOptions::default() },
                )
                .unwrap();
                let out = reader.read_all().unwrap();
                reader.close();
                out
            });
        });
    }
    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let payload = random_bytes(8 << 20, 43);

    let mut group = c.benchmark_group("decode_full_file_by_chunk_size");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    for d_chunk_size in [4096u64, 65536, 262_144] {
        let bytes = encode(&payload, d_chunk_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(d_chunk_size),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes.clone()));
                    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
                    let out = reader.read_all().unwrap();
                    reader.close();
                    out
                });
            },
        );
    }
    group.finish();
}

fn bench_partial_range(c: &mut Criterion) {
    let payload = random_bytes(8 << 20, 44);
    let bytes = encode(&payload, 1 << 16);
    let (lo, hi) = (1 << 20, 2 << 20);

    c.bench_function("decode_partial_range", |b| {
        b.iter(|| {
            let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes.clone()));
            let reader = Reader::open(source, ReaderOptions::default()).unwrap();
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
            out
        });
    });
}

criterion_group!(benches, bench_worker_counts, bench_chunk_sizes, bench_partial_range);
criterion_main!(benches);
