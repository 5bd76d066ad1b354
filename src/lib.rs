//! RAC (Random Access Compression): a hierarchical-index container format
//! for parallel, random-access decoding of compressed data, with codecs
//! plugged in behind a narrow dispatch interface (§6.4).
//!
//! A RAC file pairs a growing stream of independently-decodable chunks
//! (DSpace → CSpace) with a small index tree that maps any decompressed
//! byte range to the chunks covering it, so a reader can seek to an
//! arbitrary offset without decompressing everything before it.

pub mod block;
pub mod chunk_reader;
pub mod cli;
pub mod codec;
pub mod config;
pub mod container;
pub mod encode;
pub mod engine;
pub mod error;
pub mod index;
pub mod node;
pub mod notify;
pub mod primitive;
pub mod reader;
pub mod source;
pub mod temp_storage;
pub mod threadpool;
pub mod writer;

pub use chunk_reader::{ChunkEntry, ChunkReader, Summary as ChunkSummary};
pub use codec::{Codec, CodecDecoder, CodecEncoder, CodecRegistry, TAG_LZ4_BLOCK, TAG_STORE};
pub use container::{Footer, IndexLocation, FILE_MAGIC};
pub use engine::{DecodingEngine, RangeReader, ReadStatus};
pub use error::{RacError, RacResult};
pub use index::{IndexBuilder, IndexReader, Locate};
pub use primitive::{CPtr, DPtr};
pub use reader::{Reader, ReaderOptions};
pub use source::{MemorySource, RandomAccessSource, SeekReadSource};
pub use temp_storage::{InMemoryTempStorage, OnDiskTempStorage, TempStorage};
pub use writer::{TempStorageKind, Writer, WriterOptions};
