//! # linkframe-codec
//!
//! Link frame codec with error detection.
//!
//! This crate provides:
//! - Bit-string conversions between text, bytes, hex and `0`/`1` strings
//! - CRC-8/10/16/32 and 16-bit checksum generation and verification
//! - A fixed 120-bit frame header with addressing, length and end flag
//! - Segmentation of a payload into equal-length frames
//! - Frame validation and in-order reassembly
//! - Fault injection and detection-coverage simulation

pub mod bits;
pub mod coverage;
pub mod error;
pub mod frame;
pub mod framer;
pub mod inject;
pub mod redundancy;
pub mod validator;

pub use bits::{
    bits_to_bytes, bits_to_hex, bits_to_text, bytes_to_bits, hex_to_bits, text_to_bits, Bits,
};
pub use coverage::{CoveragePlan, CoverageReport, CoverageSummary};
pub use error::{CodecError, Encoding};
pub use frame::{Address, Frame, FrameFields, FrameHeader, HEADER_BITS};
pub use framer::{chunk_bits, segment, Segmenter};
pub use inject::{corrupt, Corruption, ErrorInjector, ErrorModel};
pub use redundancy::{Code, Polynomial, Scheme};
pub use validator::{validate, InvalidFramePolicy, Reassembler, ReassemblyStats, Validity};

/// Default frame size in bytes.
pub const DEFAULT_FRAME_SIZE: usize = coverage::DEFAULT_FRAME_SIZE;

/// Default port for the link transport.
pub const DEFAULT_PORT: u16 = 12345;
