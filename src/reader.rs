//! Top-level `Reader` (§4.2, §4.4, §6.1): parses the footer, opens the
//! index, and hands out range reads through the decoding engine.

use std::sync::Arc;

use crate::config::default_worker_count;
use crate::container::{Footer, FOOTER_LEN};
use crate::codec::CodecRegistry;
use crate::engine::{DecodingEngine, RangeReader};
use crate::error::{RacError, RacResult};
use crate::primitive::DPtr;
use crate::source::RandomAccessSource;

pub struct ReaderOptions {
    pub workers: usize,
    pub registry: Arc<CodecRegistry>,
    pub resources: Vec<Vec<u8>>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            workers: default_worker_count(),
            registry: Arc::new(CodecRegistry::with_builtins()),
            resources: Vec::new(),
        }
    }
}

pub struct Reader {
    engine: DecodingEngine,
    d_file_size: DPtr,
}

impl Reader {
    /// `open` (§6.1): reads the fixed-size footer from the tail of `source`
    /// to learn `DFileSize` and the root CPtr, then builds the index reader
    /// and decoding engine over it.
    pub fn open(source: Arc<dyn RandomAccessSource>, options: ReaderOptions) -> RacResult<Self> {
        let total_len = source.len();
        if total_len < FOOTER_LEN as u64 {
            return Err(RacError::Truncated);
        }
        let mut footer_bytes = vec![0u8; FOOTER_LEN];
        source.read_at_exact(total_len - FOOTER_LEN as u64, &mut footer_bytes)?;
        let footer = Footer::decode(&footer_bytes)?;

        let index = Arc::new(crate::index::IndexReader::open(
            Arc::clone(&source),
            footer.d_file_size,
            footer.root_cptr,
        ));
        let engine = DecodingEngine::open(source, index, options.registry, options.resources, options.workers)?;
        Ok(Reader { engine, d_file_size: footer.d_file_size })
    }

    pub fn d_file_size(&self) -> DPtr {
        self.d_file_size
    }

    /// `seekRange(dLo, dHi)` (§4.4).
    pub fn seek_range(&self, d_lo: DPtr, d_hi: DPtr) -> RacResult<RangeReader> {
        self.engine.seek_range(d_lo, d_hi)
    }

    /// Convenience: decode and return the whole file.
    pub fn read_all(&self) -> RacResult<Vec<u8>> {
        let mut reader = self.seek_range(0, self.d_file_size)?;
        let mut out = vec![0u8; self.d_file_size as usize];
        let mut total = 0;
        loop {
            let (n, status) = reader.read(&mut out[total..])?;
            total += n;
            if status == crate::engine::ReadStatus::Eof {
                break;
            }
        }
        out.truncate(total);
        Ok(out)
    }

    pub fn close(&self) {
        self.engine.close();
    }
}
