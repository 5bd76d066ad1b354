//! Range correctness and idempotent-seek properties (spec §8):
//! `read(encode(S), i..j) == S[i..j]`, and repeated seeks to the same range
//! produce the same bytes.

use std::sync::Arc;

use rac::codec::TAG_LZ4_BLOCK;
use rac::container::IndexLocation;
use rac::engine::{RangeReader, ReadStatus};
use rac::reader::{Reader, ReaderOptions};
use rac::source::{MemorySource, RandomAccessSource};
use rac::writer::{Writer, WriterOptions};

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

fn drain(reader: &mut RangeReader, hint: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; hint.max(1)];
    loop {
        let (n, status) = reader.read(&mut buf).unwrap();
        out.extend_from_slice(&buf[..n]);
        if status == ReadStatus::Eof {
            break;
        }
    }
    out
}

fn read_range(bytes: &[u8], lo: u64, hi: u64) -> Vec<u8> {
    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes.to_vec()));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    let mut range_reader = reader.seek_range(lo, hi).unwrap();
    let out = drain(&mut range_reader, (hi - lo) as usize);
    reader.close();
    out
}

#[test]
fn range_reads_match_slices_of_the_original() {
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let bytes = encode(&payload, 97);

    let bounds: &[(u64, u64)] = &[
        (0, 0),
        (0, 1),
        (0, payload.len() as u64),
        (1, 1),
        (3, 3),
        (10, 500),
        (4999, 5000),
        (2500, 2500),
        (123, 4999),
    ];
    for &(lo, hi) in bounds {
        let got = read_range(&bytes, lo, hi);
        assert_eq!(got, payload[lo as usize..hi as usize], "range {lo}..{hi}");
    }
}

#[test]
fn seek_range_clamps_bounds_past_the_end_of_file() {
    let payload = b"clamped ranges never read past DFileSize".to_vec();
    let bytes = encode(&payload, 9);
    let got = read_range(&bytes, 5, payload.len() as u64 + 1000);
    assert_eq!(got, payload[5..]);
}

#[test]
fn inverted_range_yields_nothing() {
    let payload = b"an inverted lo > hi range is an empty read, not an error".to_vec();
    let bytes = encode(&payload, 6);
    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();
    let mut range_reader = reader.seek_range(30, 10).unwrap();
    let mut buf = [0u8; 8];
    let (n, status) = range_reader.read(&mut buf).unwrap();
    assert_eq!(n, 0);
    assert_eq!(status, ReadStatus::Eof);
    reader.close();
}

#[test]
fn idempotent_seek_produces_same_output_twice() {
    let payload = b"idempotent seek across repeated range reads, twice over".to_vec();
    let bytes = encode(&payload, 8);
    let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(bytes));
    let reader = Reader::open(source, ReaderOptions::default()).unwrap();

    let mut first = reader.seek_range(5, 40).unwrap();
    let a = drain(&mut first, 16);
    let mut second = reader.seek_range(5, 40).unwrap();
    let b = drain(&mut second, 16);
    assert_eq!(a, b);
    assert_eq!(a, payload[5..40]);
    reader.close();
}
