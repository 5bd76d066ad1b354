//! RAC error taxonomy.
//!
//! Grouped exactly per the error handling design: Structural errors are
//! fatal for the reader and surface lazily (on first access to the
//! offending node); Codec errors terminate the current read without
//! poisoning the reader; Io errors bubble up from the underlying source;
//! Misuse errors are programming errors.
//!
//! No `thiserror`: variants carry their own `Display` text directly, the
//! same way the LZ4 frame error type in this codebase does.

use std::fmt;

/// One failure kind, one line of description — no partial decompressed
/// output is ever claimed successful alongside an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RacError {
    // ── Structural ───────────────────────────────────────────────────────
    /// The 4-byte magic at the expected position did not match `racN`/`racF`.
    BadMagic,
    /// A version/parity bit combination this reader does not understand.
    BadVersion,
    /// The source ended before a required field could be read.
    Truncated,
    /// A node's declared invariants (§3) do not hold.
    MalformedIndex(String),
    /// A child CPtr points at or before its own node's CPtr.
    CycleInIndex,
    /// Tree depth exceeded the hard safety cap.
    DepthLimitExceeded,
    /// A node's `arity` fell outside `1..=255` (or 0 for a non-empty file).
    ArityOutOfRange,

    // ── Codec ────────────────────────────────────────────────────────────
    /// A codec's `decode`/`encode` call failed; `tag` identifies which one.
    CodecReported { tag: u8, message: String },
    /// No codec is registered under the requested tag.
    UnsupportedCodec(u8),

    // ── I/O ──────────────────────────────────────────────────────────────
    /// The underlying source returned fewer bytes than required after it
    /// had already been closed (a transient short read on an open source
    /// is not an error — see `Reader`/`Writer` suspension handling).
    ShortRead,
    ShortWrite,
    SourceClosed,
    Io(String),

    // ── Misuse ───────────────────────────────────────────────────────────
    /// A second `read` was issued while a previous one was still in flight.
    ConcurrentRead,
    /// `write`/`close` called on a writer that had already been closed.
    WriteAfterClose,
    UnsupportedOption(String),
}

impl fmt::Display for RacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RacError::BadMagic => write!(f, "bad magic: not a RAC file"),
            RacError::BadVersion => write!(f, "unsupported RAC version/framing"),
            RacError::Truncated => write!(f, "truncated RAC file"),
            RacError::MalformedIndex(why) => write!(f, "malformed index: {why}"),
            RacError::CycleInIndex => write!(f, "cycle detected in index"),
            RacError::DepthLimitExceeded => write!(f, "index tree depth limit exceeded"),
            RacError::ArityOutOfRange => write!(f, "node arity out of range"),
            RacError::CodecReported { tag, message } => {
                write!(f, "codec {tag} reported: {message}")
            }
            RacError::UnsupportedCodec(tag) => write!(f, "unsupported codec tag {tag}"),
            RacError::ShortRead => write!(f, "short read from compressed source"),
            RacError::ShortWrite => write!(f, "short write to output"),
            RacError::SourceClosed => write!(f, "source closed"),
            RacError::Io(msg) => write!(f, "I/O error: {msg}"),
            RacError::ConcurrentRead => write!(f, "concurrent read on the same reader"),
            RacError::WriteAfterClose => write!(f, "write after close"),
            RacError::UnsupportedOption(msg) => write!(f, "unsupported option: {msg}"),
        }
    }
}

impl std::error::Error for RacError {}

impl From<std::io::Error> for RacError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => RacError::ShortRead,
            std::io::ErrorKind::WriteZero => RacError::ShortWrite,
            _ => RacError::Io(e.to_string()),
        }
    }
}

pub type RacResult<T> = Result<T, RacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_one_line() {
        let e = RacError::MalformedIndex("DRange mismatch".into());
        let s = e.to_string();
        assert!(!s.contains('\n'));
        assert!(s.contains("DRange mismatch"));
    }

    #[test]
    fn io_error_maps_eof_to_short_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(RacError::from(io_err), RacError::ShortRead);
    }

    #[test]
    fn io_error_maps_other_kinds_generically() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(RacError::from(io_err), RacError::Io(_)));
    }
}
