//! Encoder driver (§4.6): chunking policy, codec dispatch, and chunk sinks
//! feeding an `IndexBuilder`.

pub mod driver;

pub use driver::{ChunkSink, ChunkingPolicy, DirectSink, EncoderDriver, TempStorageSink};
