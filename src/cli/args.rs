//! `ractool` argument grammar (§6.2): encode/decode/info subcommands.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ractool", about = "Random Access Compression container tool", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Notification verbosity: 0 silences all stderr output.
    #[arg(short, long, global = true, default_value_t = 1)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encode a file into a RAC container.
    Encode {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = CodecArg::Lz4)]
        codec: CodecArg,

        /// Fixed decompressed chunk size. Mutually exclusive with `--c-chunk-size`.
        #[arg(long, default_value_t = 0)]
        d_chunk_size: u64,

        /// Target compressed chunk size (bisected to fit). Mutually exclusive
        /// with `--d-chunk-size`.
        #[arg(long, default_value_t = 0)]
        c_chunk_size: u64,

        /// Zero-pad each chunk's start to this CSpace alignment.
        #[arg(long, default_value_t = 0)]
        page_size: u64,

        #[arg(long, value_enum, default_value_t = IndexLocationArg::End)]
        index_location: IndexLocationArg,

        /// A shared resource blob (dictionary) available to the codec.
        /// Repeatable; order determines resource index.
        #[arg(long = "resource")]
        resources: Vec<PathBuf>,
    },

    /// Decode a RAC container, optionally restricted to a DSpace range.
    Decode {
        input: PathBuf,
        output: Option<PathBuf>,

        /// A DSpace range `i..j`, `i..`, `..j`, or `..` (the whole file).
        #[arg(long, default_value = "..")]
        range: RangeArg,

        /// Reader worker count. 0 or absent selects the default
        /// concurrency; 1 is equivalent to `--singlethreaded`.
        #[arg(long, default_value_t = 0)]
        workers: usize,

        #[arg(long)]
        singlethreaded: bool,
    },

    /// Print a structural summary: DFileSize, chunk count, codec tags in use.
    Info { input: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CodecArg {
    Store,
    Lz4,
}

impl CodecArg {
    pub fn tag(self) -> u8 {
        match self {
            CodecArg::Store => crate::codec::TAG_STORE,
            CodecArg::Lz4 => crate::codec::TAG_LZ4_BLOCK,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum IndexLocationArg {
    Start,
    End,
}

impl From<IndexLocationArg> for crate::container::IndexLocation {
    fn from(a: IndexLocationArg) -> Self {
        match a {
            IndexLocationArg::Start => crate::container::IndexLocation::Start,
            IndexLocationArg::End => crate::container::IndexLocation::End,
        }
    }
}

/// A DSpace range with either bound omittable, e.g. `10..20`, `10..`,
/// `..20`, or `..` for the whole file (§9: "the core should not care"
/// about exact range syntax — this is the CLI's own choice).
#[derive(Clone, Copy, Debug)]
pub struct RangeArg {
    pub lo: Option<u64>,
    pub hi: Option<u64>,
}

impl FromStr for RangeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo_str, hi_str) = s
            .split_once("..")
            .ok_or_else(|| format!("range {s:?} must contain \"..\""))?;
        let lo = if lo_str.is_empty() {
            None
        } else {
            Some(lo_str.parse::<u64>().map_err(|e| e.to_string())?)
        };
        let hi = if hi_str.is_empty() {
            None
        } else {
            Some(hi_str.parse::<u64>().map_err(|e| e.to_string())?)
        };
        Ok(RangeArg { lo, hi })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_has_no_bounds() {
        let r: RangeArg = "..".parse().unwrap();
        assert!(r.lo.is_none() && r.hi.is_none());
    }

    #[test]
    fn both_bounds_parse() {
        let r: RangeArg = "10..20".parse().unwrap();
        assert_eq!(r.lo, Some(10));
        assert_eq!(r.hi, Some(20));
    }

    #[test]
    fn only_low_bound() {
        let r: RangeArg = "10..".parse().unwrap();
        assert_eq!(r.lo, Some(10));
        assert_eq!(r.hi, None);
    }

    #[test]
    fn only_high_bound() {
        let r: RangeArg = "..20".parse().unwrap();
        assert_eq!(r.lo, None);
        assert_eq!(r.hi, Some(20));
    }

    #[test]
    fn missing_separator_is_rejected() {
        assert!("1020".parse::<RangeArg>().is_err());
    }
}
