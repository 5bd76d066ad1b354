//! Decoding engine (§4.4): parallel, order-preserving chunk dispatch over
//! an `IndexReader`, with a bounded chunk cache (§5).

pub mod cache;
pub mod decode;

pub use decode::{DecodingEngine, RangeReader, ReadStatus};
