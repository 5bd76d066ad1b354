//! Top-level `Writer` (§4.5, §4.6, §6.1): owns the encoder driver, the index
//! builder, and the chunk sink, and assembles the final framed file.

use std::io::Write;
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::container::{Footer, IndexLocation, FILE_MAGIC};
use crate::encode::{ChunkingPolicy, DirectSink, EncoderDriver, TempStorageSink};
use crate::error::{RacError, RacResult};
use crate::index::builder::{flush_end, flush_start, IndexBuilder};
use crate::primitive::{CPtr, DPtr};
use crate::temp_storage::{InMemoryTempStorage, OnDiskTempStorage, TempStorage};

/// Which backing a `Writer` stages chunks in when `IndexLocation::Start` is
/// selected (§4.7). Irrelevant for `IndexLocation::End`, where chunks go
/// straight to the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempStorageKind {
    InMemory,
    OnDisk,
}

pub struct WriterOptions {
    pub codec_tag: u8,
    pub resources: Vec<Vec<u8>>,
    pub d_chunk_size: u64,
    pub c_chunk_size: u64,
    pub c_page_size: u64,
    pub index_location: IndexLocation,
    pub temp_storage: TempStorageKind,
    pub registry: Arc<CodecRegistry>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            codec_tag: crate::codec::TAG_LZ4_BLOCK,
            resources: Vec::new(),
            d_chunk_size: 0,
            c_chunk_size: 0,
            c_page_size: 0,
            index_location: IndexLocation::End,
            temp_storage: TempStorageKind::InMemory,
            registry: Arc::new(CodecRegistry::with_builtins()),
        }
    }
}

enum Staging {
    /// `IndexLocation::End`: chunks already live at their final offset in
    /// the output; `cursor` tracks the next write position.
    Direct { cursor: CPtr },
    /// `IndexLocation::Start`: chunks are staged here until `close` knows
    /// the index's footprint and can shift them into place.
    Temp(Box<dyn TempStorage>),
}

pub struct Writer<W: Write> {
    out: Option<W>,
    builder: IndexBuilder,
    options: WriterOptions,
    staging: Staging,
    d_file_size: DPtr,
}

impl<W: Write> Writer<W> {
    /// `open` (§6.1). For `IndexLocation::End` the file magic is written
    /// immediately since chunks are appended directly after it as `write`
    /// is called. For `IndexLocation::Start`, chunks land in `TempStorage`
    /// instead and nothing reaches `out` until `close`, which writes the
    /// magic, the index, and the copied chunk data in that order.
    pub fn open(mut out: W, options: WriterOptions) -> RacResult<Self> {
        let staging = match options.index_location {
            IndexLocation::End => {
                out.write_all(&FILE_MAGIC)?;
                Staging::Direct { cursor: FILE_MAGIC.len() as CPtr }
            }
            IndexLocation::Start => {
                let temp: Box<dyn TempStorage> = match options.temp_storage {
                    TempStorageKind::InMemory => Box::new(InMemoryTempStorage::new()),
                    TempStorageKind::OnDisk => Box::new(OnDiskTempStorage::new()?),
                };
                Staging::Temp(temp)
            }
        };
        Ok(Writer {
            out: Some(out),
            builder: IndexBuilder::new(),
            options,
            staging,
            d_file_size: 0,
        })
    }

    /// `write` (§4.6): chunks and compresses `src`, appending it to the
    /// file's growing DRange. May be called more than once; each call's
    /// source is fully drained before it returns. A fresh `EncoderDriver` is
    /// built per call (its codec borrow can't outlive a single call without
    /// making `Writer` self-referential), but it is seeded with the running
    /// `d_file_size` so DPtrs keep climbing across calls instead of
    /// restarting at zero.
    pub fn write<R: std::io::Read>(&mut self, src: R) -> RacResult<()> {
        if self.out.is_none() {
            return Err(RacError::WriteAfterClose);
        }
        let codec = self.options.registry.get(self.options.codec_tag)?;
        let resource_refs: Vec<&[u8]> = self.options.resources.iter().map(Vec::as_slice).collect();
        let resource_indices: Vec<u32> = (0..self.options.resources.len() as u32).collect();
        let policy = ChunkingPolicy::new(self.options.d_chunk_size, self.options.c_chunk_size, self.options.c_page_size)?;
        let mut driver = EncoderDriver::new(codec, self.options.codec_tag, resource_refs, resource_indices, policy);

        let consumed = match &mut self.staging {
            Staging::Direct { cursor } => {
                let out = self.out.as_mut().expect("checked above");
                let mut sink = DirectSink::new(out, *cursor);
                let consumed = driver.encode_all(src, &mut sink, &mut self.builder, self.d_file_size)?;
                *cursor = sink.cursor();
                consumed
            }
            Staging::Temp(temp) => {
                let mut sink = TempStorageSink::new(temp.as_ref());
                driver.encode_all(src, &mut sink, &mut self.builder, self.d_file_size)?
            }
        };
        self.d_file_size += consumed;
        Ok(())
    }

    /// `close` (§4.5, §6.1): flushes the index, writes the footer, and
    /// returns the underlying writer. The empty-file sentinel (no `write`
    /// calls at all) writes `DFileSize = 0` with an unused root CPtr.
    pub fn close(mut self) -> RacResult<W> {
        let mut out = self.out.take().ok_or(RacError::WriteAfterClose)?;
        let root = self.builder.finish();

        let root_cptr = match (root, self.staging) {
            (None, Staging::Direct { .. }) => 0,
            (None, Staging::Temp(_)) => {
                out.write_all(&FILE_MAGIC)?;
                0
            }
            (Some(root), Staging::Direct { cursor }) => flush_end(&root, &mut out, cursor)?,
            (Some(root), Staging::Temp(temp)) => {
                let mut index_region = FILE_MAGIC.to_vec();
                let (root_cptr, leaf_shift) = flush_start(&root, &mut index_region)?;
                debug_assert_eq!(leaf_shift, index_region.len() as CPtr);
                out.write_all(&index_region)?;
                copy_temp_storage(temp.as_ref(), &mut out)?;
                root_cptr
            }
        };

        let footer = Footer {
            d_file_size: self.d_file_size,
            root_cptr,
            reserved_checksum: [0u8; 8],
        };
        out.write_all(&footer.encode())?;
        Ok(out)
    }
}

const COPY_CHUNK: usize = 1 << 16;

fn copy_temp_storage<W: Write>(temp: &dyn TempStorage, out: &mut W) -> RacResult<()> {
    let total = temp.len()?;
    let mut offset = 0u64;
    while offset < total {
        let want = (total - offset).min(COPY_CHUNK as u64) as usize;
        let bytes = temp.read_at(offset, want)?;
        out.write_all(&bytes)?;
        offset += bytes.len() as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexReader;
    use crate::source::MemorySource;

    fn read_back_all(bytes: Vec<u8>) -> Vec<u8> {
        let footer_start = bytes.len() - crate::container::FOOTER_LEN;
        let footer = Footer::decode(&bytes[footer_start..]).unwrap();
        let source = Arc::new(MemorySource::new(bytes));
        let index = IndexReader::open(source.clone(), footer.d_file_size, footer.root_cptr);
        let mut out = Vec::new();
        for leaf in index.iterate_leaves(0..footer.d_file_size) {
            let leaf = leaf.unwrap();
            let c_len = (leaf.c_range.end - leaf.c_range.start) as usize;
            let mut raw = vec![0u8; c_len];
            source.read_at_exact(leaf.c_range.start, &mut raw).unwrap();
            let registry = CodecRegistry::with_builtins();
            let codec = registry.get(leaf.codec_tag).unwrap();
            let expected_len = (leaf.d_range.end - leaf.d_range.start) as usize;
            out.extend(codec.decode(&raw, &[], expected_len).unwrap());
        }
        out
    }

    #[test]
    fn end_mode_roundtrips_store_codec() {
        let options = WriterOptions {
            codec_tag: crate::codec::TAG_STORE,
            d_chunk_size: 4,
            index_location: IndexLocation::End,
            ..WriterOptions::default()
        };
        let mut writer = Writer::open(Vec::new(), options).unwrap();
        writer.write(&b"abcdefghij"[..]).unwrap();
        let bytes = writer.close().unwrap();
        assert_eq!(read_back_all(bytes), b"abcdefghij");
    }

    #[test]
    fn start_mode_roundtrips_store_codec() {
        let options = WriterOptions {
            codec_tag: crate::codec::TAG_STORE,
            d_chunk_size: 3,
            index_location: IndexLocation::Start,
            temp_storage: TempStorageKind::InMemory,
            ..WriterOptions::default()
        };
        let mut writer = Writer::open(Vec::new(), options).unwrap();
        writer.write(&b"abcdefghijklm"[..]).unwrap();
        let bytes = writer.close().unwrap();
        assert_eq!(read_back_all(bytes), b"abcdefghijklm");
    }

    #[test]
    fn multiple_writes_extend_the_same_drange() {
        let options = WriterOptions {
            codec_tag: crate::codec::TAG_STORE,
            d_chunk_size: 4,
            index_location: IndexLocation::End,
            ..WriterOptions::default()
        };
        let mut writer = Writer::open(Vec::new(), options).unwrap();
        writer.write(&b"abcd"[..]).unwrap();
        writer.write(&b"efgh"[..]).unwrap();
        let bytes = writer.close().unwrap();
        assert_eq!(read_back_all(bytes), b"abcdefgh");
    }

    #[test]
    fn empty_file_sentinel_has_zero_d_file_size() {
        let options = WriterOptions { index_location: IndexLocation::End, ..WriterOptions::default() };
        let writer = Writer::open(Vec::new(), options).unwrap();
        let bytes = writer.close().unwrap();
        let footer_start = bytes.len() - crate::container::FOOTER_LEN;
        let footer = Footer::decode(&bytes[footer_start..]).unwrap();
        assert_eq!(footer.d_file_size, 0);
    }

    #[test]
    fn lz4_codec_roundtrips_through_writer() {
        let options = WriterOptions {
            codec_tag: crate::codec::TAG_LZ4_BLOCK,
            d_chunk_size: 16,
            index_location: IndexLocation::End,
            ..WriterOptions::default()
        };
        let mut writer = Writer::open(Vec::new(), options).unwrap();
        let payload = b"the quick brown fox jumps over the lazy dog, repeatedly: the quick brown fox jumps over the lazy dog";
        writer.write(&payload[..]).unwrap();
        let bytes = writer.close().unwrap();
        assert_eq!(read_back_all(bytes), payload);
    }
}
