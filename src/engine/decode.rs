//! Decoding engine (§4.4): walks the index in DPtr order, dispatches chunk
//! decode jobs across a worker pool, and drains results back to the caller
//! strictly in order through a position-indexed slot table (§5).
//!
//! Mirrors the teacher's `TPool`-based concurrency model (`src/threadpool.rs`)
//! rather than introducing a second pool abstraction: workers are rayon
//! tasks bounded by a semaphore channel, and ordering is enforced here by a
//! slot table keyed by leaf index rather than by DPtr directly, since leaf
//! index is what the dispatcher and the consumer both iterate by.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::codec::CodecRegistry;
use crate::config::CACHE_SLACK;
use crate::engine::cache::ChunkCache;
use crate::error::{RacError, RacResult};
use crate::index::{IndexReader, LeafEntry};
use crate::primitive::DPtr;
use crate::source::RandomAccessSource;
use crate::threadpool::TPool;

/// What `read` returned beyond the byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// More bytes remain in the current range.
    More,
    /// The requested end bound has been reached; `buf` may still hold a
    /// partial fill from this same call.
    Eof,
}

struct EngineInner {
    source: Arc<dyn RandomAccessSource>,
    index: Arc<IndexReader>,
    registry: Arc<CodecRegistry>,
    resources: Vec<Vec<u8>>,
    workers: usize,
    pool: Option<TPool>,
    cache: Mutex<ChunkCache>,
}

/// Owns the worker pool and chunk cache for one open file. Cheap to clone
/// (an `Arc` underneath); each `seek_range` call produces an independent
/// `RangeReader` over the same shared pool and cache.
#[derive(Clone)]
pub struct DecodingEngine(Arc<EngineInner>);

impl DecodingEngine {
    /// `open` per §4.4. `workers` is clamped to at least 1; `W = 1` runs the
    /// dispatcher inline on the reader thread with no pool at all, per the
    /// single-threaded-mode policy in §4.4.
    pub fn open(
        source: Arc<dyn RandomAccessSource>,
        index: Arc<IndexReader>,
        registry: Arc<CodecRegistry>,
        resources: Vec<Vec<u8>>,
        workers: usize,
    ) -> RacResult<Self> {
        let workers = workers.max(1);
        let pool = if workers > 1 {
            Some(
                TPool::new(workers, workers * 2)
                    .ok_or_else(|| RacError::Io("failed to start decoding worker pool".into()))?,
            )
        } else {
            None
        };
        let cache = ChunkCache::new(workers + CACHE_SLACK);
        Ok(DecodingEngine(Arc::new(EngineInner {
            source,
            index,
            registry,
            resources,
            workers,
            pool,
            cache: Mutex::new(cache),
        })))
    }

    /// `seekRange(dLo, dHi)` (§4.4): establishes position and end bound.
    /// Clamped to `[0, DFileSize]`; an already-empty range yields a reader
    /// that is immediately at `Eof`.
    pub fn seek_range(&self, d_lo: DPtr, d_hi: DPtr) -> RacResult<RangeReader> {
        let d_file_size = self.0.index.d_file_size();
        let d_hi = d_hi.min(d_file_size);
        let d_lo = d_lo.min(d_hi);
        let leaves: Vec<LeafEntry> = if d_lo >= d_hi {
            Vec::new()
        } else {
            self.0
                .index
                .iterate_leaves(d_lo..d_hi)
                .collect::<RacResult<Vec<_>>>()?
        };
        Ok(RangeReader::new(Arc::clone(&self.0), d_lo, d_hi, leaves))
    }

    /// `close()`: waits for in-flight workers to finish.
    pub fn close(&self) {
        if let Some(pool) = &self.0.pool {
            pool.jobs_completed();
        }
    }

    /// `closeWithoutWaiting()`: per §5, a fire-and-forget cancellation.
    /// rayon gives no hard preemption of running tasks, so this releases our
    /// reference to the pool without blocking; any jobs already submitted
    /// keep running to completion in the background and their results are
    /// simply never drained.
    pub fn close_without_waiting(self) {
        drop(self);
    }
}

fn decode_leaf(inner: &EngineInner, leaf: &LeafEntry) -> RacResult<Vec<u8>> {
    let c_len = (leaf.c_range.end - leaf.c_range.start) as usize;
    let mut raw = vec![0u8; c_len];
    inner.source.read_at_exact(leaf.c_range.start, &mut raw)?;
    let codec = inner.registry.get(leaf.codec_tag)?;
    let resource_refs: Vec<&[u8]> = leaf
        .resources
        .iter()
        .map(|&idx| {
            inner
                .resources
                .get(idx as usize)
                .map(|v| v.as_slice())
                .ok_or_else(|| RacError::MalformedIndex(format!("resource index {idx} out of range")))
        })
        .collect::<RacResult<_>>()?;
    let expected_len = (leaf.d_range.end - leaf.d_range.start) as usize;
    codec.decode(&raw, &resource_refs, expected_len)
}

/// Shared slot table workers post results into; the consumer drains it by
/// leaf index, which is monotonic with DPtr order by construction (§5:
/// "outputs are serialized through a position-indexed slot table").
struct SlotTable {
    slots: Mutex<HashMap<usize, RacResult<Vec<u8>>>>,
    ready: Condvar,
}

impl SlotTable {
    fn new() -> Self {
        SlotTable {
            slots: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
        }
    }

    fn post(&self, idx: usize, result: RacResult<Vec<u8>>) {
        let mut slots = self.slots.lock().expect("slot table poisoned");
        slots.insert(idx, result);
        self.ready.notify_all();
    }

    fn take(&self, idx: usize) -> RacResult<Vec<u8>> {
        let mut slots = self.slots.lock().expect("slot table poisoned");
        loop {
            if let Some(result) = slots.remove(&idx) {
                return result;
            }
            slots = self.ready.wait(slots).expect("slot table poisoned");
        }
    }
}

/// One in-progress `seekRange`/`read` session. Not `Send` across
/// independent reads on the same engine — §5 explicitly leaves concurrent
/// reads on one engine undefined, so a fresh `RangeReader` per logical read
/// is the supported pattern.
pub struct RangeReader {
    inner: Arc<EngineInner>,
    d_lo: DPtr,
    d_hi: DPtr,
    pos: DPtr,
    leaves: Vec<LeafEntry>,
    slots: Arc<SlotTable>,
    next_dispatch: usize,
    next_consume: usize,
    window: usize,
    current: Option<CurrentChunk>,
}

struct CurrentChunk {
    leaf: LeafEntry,
    bytes: Arc<Vec<u8>>,
    read_offset: usize,
}

impl RangeReader {
    fn new(inner: Arc<EngineInner>, d_lo: DPtr, d_hi: DPtr, leaves: Vec<LeafEntry>) -> Self {
        let window = inner.workers;
        let mut reader = RangeReader {
            inner,
            d_lo,
            d_hi,
            pos: d_lo,
            leaves,
            slots: Arc::new(SlotTable::new()),
            next_dispatch: 0,
            next_consume: 0,
            window,
            current: None,
        };
        reader.dispatch_upto();
        reader
    }

    fn dispatch_upto(&mut self) {
        while self.next_dispatch < self.leaves.len() && self.next_dispatch - self.next_consume < self.window {
            let idx = self.next_dispatch;
            self.next_dispatch += 1;
            let leaf = self.leaves[idx].clone();

            let cached = self
                .inner
                .cache
                .lock()
                .expect("chunk cache poisoned")
                .get(leaf.c_range.start);
            if let Some(bytes) = cached {
                self.slots.post(idx, Ok((*bytes).clone()));
                continue;
            }

            match &self.inner.pool {
                None => {
                    let result = decode_leaf(&self.inner, &leaf);
                    self.slots.post(idx, result);
                }
                Some(pool) => {
                    let inner = Arc::clone(&self.inner);
                    let slots = Arc::clone(&self.slots);
                    pool.submit_job(Box::new(move || {
                        let result = decode_leaf(&inner, &leaf);
                        slots.post(idx, result);
                    }));
                }
            }
        }
    }

    fn advance_to_next_leaf(&mut self) -> RacResult<bool> {
        if self.next_consume >= self.leaves.len() {
            return Ok(false);
        }
        let idx = self.next_consume;
        let leaf = self.leaves[idx].clone();
        let bytes = Arc::new(self.slots.take(idx)?);
        self.next_consume += 1;
        {
            let mut cache = self.inner.cache.lock().expect("chunk cache poisoned");
            cache.insert(leaf.c_range.start, Arc::clone(&bytes));
            cache.pin(leaf.c_range.start);
        }
        self.dispatch_upto();
        self.current = Some(CurrentChunk {
            leaf,
            bytes,
            read_offset: 0,
        });
        Ok(true)
    }

    /// Releases the cache pin held by the reader head's current chunk, if
    /// any, then clears it.
    fn clear_current(&mut self) {
        if let Some(chunk) = self.current.take() {
            self.inner
                .cache
                .lock()
                .expect("chunk cache poisoned")
                .unpin(chunk.leaf.c_range.start);
        }
    }

    /// `read(buf) -> (n, status)` (§4.4). Clips output at `d_lo`/`d_hi` when
    /// the requested range starts or ends partway through a leaf.
    pub fn read(&mut self, buf: &mut [u8]) -> RacResult<(usize, ReadStatus)> {
        let mut written = 0;
        while written < buf.len() {
            if self.pos >= self.d_hi {
                return Ok((written, ReadStatus::Eof));
            }
            if self.current.is_none() && !self.advance_to_next_leaf()? {
                return Ok((written, ReadStatus::Eof));
            }
            let chunk = self.current.as_mut().expect("just populated");
            let clip_lo = self.d_lo.max(chunk.leaf.d_range.start) - chunk.leaf.d_range.start;
            let clip_hi = self.d_hi.min(chunk.leaf.d_range.end) - chunk.leaf.d_range.start;
            let avail_start = (clip_lo as usize).max(chunk.read_offset);
            let avail_end = clip_hi as usize;
            if avail_start >= avail_end {
                self.clear_current();
                continue;
            }
            let want = (avail_end - avail_start).min(buf.len() - written);
            buf[written..written + want].copy_from_slice(&chunk.bytes[avail_start..avail_start + want]);
            chunk.read_offset = avail_start + want;
            written += want;
            self.pos += want as DPtr;
            if chunk.read_offset >= avail_end {
                self.clear_current();
            }
        }
        let status = if self.pos >= self.d_hi {
            ReadStatus::Eof
        } else {
            ReadStatus::More
        };
        Ok((written, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexReader;
    use crate::node::{Framing, LeafChild, Node, NodeChildren};
    use crate::source::MemorySource;

    fn build_file(plain: &[&[u8]]) -> (Arc<dyn RandomAccessSource>, Arc<IndexReader>) {
        let mut out = vec![0u8; 4];
        let mut children = Vec::new();
        let mut d_cursor: DPtr = 0;
        for chunk in plain {
            let cptr = out.len() as u64;
            out.extend_from_slice(chunk);
            d_cursor += chunk.len() as DPtr;
            children.push(LeafChild {
                dptr_end: d_cursor,
                cptr,
                clen: chunk.len() as u32,
                codec_tag: 0,
                resource_refs: vec![],
            });
        }
        let node = Node {
            drange_lo: 0,
            resource_slots: vec![],
            children: NodeChildren::Leaf(children),
        };
        let root_cptr = out.len() as u64;
        out.extend_from_slice(&node.encode(Framing::Forward));

        let source: Arc<dyn RandomAccessSource> = Arc::new(MemorySource::new(out));
        let index = Arc::new(IndexReader::open(Arc::clone(&source), d_cursor, root_cptr));
        (source, index)
    }

    fn engine(plain: &[&[u8]], workers: usize) -> DecodingEngine {
        let (source, index) = build_file(plain);
        DecodingEngine::open(source, index, Arc::new(CodecRegistry::with_builtins()), Vec::new(), workers).unwrap()
    }

    #[test]
    fn inline_mode_reads_full_range_in_order() {
        let eng = engine(&[b"ab", b"cd", b"ef"], 1);
        let mut reader = eng.seek_range(0, 6).unwrap();
        let mut out = vec![0u8; 6];
        let (n, status) = reader.read(&mut out).unwrap();
        assert_eq!(n, 6);
        assert_eq!(status, ReadStatus::Eof);
        assert_eq!(&out, b"abcdef");
    }

    #[test]
    fn pooled_mode_reads_full_range_in_order() {
        let eng = engine(&[b"ab", b"cd", b"ef", b"gh"], 4);
        let mut reader = eng.seek_range(0, 8).unwrap();
        let mut out = vec![0u8; 8];
        let mut total = 0;
        loop {
            let (n, status) = reader.read(&mut out[total..]).unwrap();
            total += n;
            if status == ReadStatus::Eof {
                break;
            }
        }
        assert_eq!(&out, b"abcdefgh");
        eng.close();
    }

    #[test]
    fn clips_partial_leaves_at_range_boundaries() {
        let eng = engine(&[b"abcd", b"efgh", b"ijkl"], 1);
        let mut reader = eng.seek_range(2, 10).unwrap();
        let mut out = vec![0u8; 8];
        let mut total = 0;
        loop {
            let (n, status) = reader.read(&mut out[total..]).unwrap();
            total += n;
            if status == ReadStatus::Eof {
                break;
            }
        }
        assert_eq!(&out[..total], b"cdefghij");
    }

    #[test]
    fn empty_range_is_immediately_eof() {
        let eng = engine(&[b"abcd"], 1);
        let mut reader = eng.seek_range(2, 2).unwrap();
        let mut out = vec![0u8; 4];
        let (n, status) = reader.read(&mut out).unwrap();
        assert_eq!(n, 0);
        assert_eq!(status, ReadStatus::Eof);
    }

    #[test]
    fn small_reads_accumulate_to_full_chunk() {
        let eng = engine(&[b"abcdefgh"], 1);
        let mut reader = eng.seek_range(0, 8).unwrap();
        let mut collected = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let (n, status) = reader.read(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if status == ReadStatus::Eof && n < buf.len() {
                break;
            }
            if status == ReadStatus::Eof {
                break;
            }
        }
        assert_eq!(collected, b"abcdefgh");
    }
}
