//! Codec error types.

use crate::redundancy::Scheme;
use std::fmt;
use thiserror::Error;

/// Textual encodings accepted by the bit conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary,
    Hex,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Binary => write!(f, "binary"),
            Encoding::Hex => write!(f, "hex"),
        }
    }
}

/// Errors raised by the frame codec.
///
/// Everything except `DetectedCorruption` is a precondition failure of the
/// caller's input. `DetectedCorruption` only appears when a caller turns an
/// `Invalid` validation outcome into an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid {encoding} input: unexpected {found:?} at index {index}")]
    InvalidEncoding {
        encoding: Encoding,
        index: usize,
        found: char,
    },

    #[error("unsupported redundancy scheme: tag {0:#04x}")]
    UnsupportedScheme(u8),

    #[error("unknown redundancy scheme name: {0:?}")]
    UnknownSchemeName(String),

    #[error("truncated frame: {len} bits (minimum {min})")]
    TruncatedFrame { len: usize, min: usize },

    #[error("frame of {frame_size_bytes} bytes leaves no payload room with {scheme}")]
    FrameTooSmall {
        frame_size_bytes: usize,
        scheme: Scheme,
    },

    #[error("frame of {frame_size_bytes} bytes gives {chunk_bits} payload bits (max {max})")]
    FrameTooLarge {
        frame_size_bytes: usize,
        chunk_bits: usize,
        max: usize,
    },

    #[error("payload of {len} bits does not fit a {chunk_bits}-bit chunk")]
    PayloadTooLong { len: usize, chunk_bits: usize },

    #[error("corruption detected in frame {index}")]
    DetectedCorruption { index: usize },

    #[error("{model} needs at least {needed} bits, input has {len}")]
    InsufficientBits {
        model: &'static str,
        needed: usize,
        len: usize,
    },

    #[error("invalid error model: {0}")]
    InvalidErrorModel(String),

    #[error("invalid address {0:?}: expected <ipv4>:<port>")]
    InvalidAddress(String),
}
