//! Bit-string representation and conversions.
//!
//! [`Bits`] is an owned, MSB-first sequence of bits. It displays as (and
//! parses from) an ASCII string of `0` and `1`, which is also the form frames
//! take on the wire.
//!
//! Conversions:
//! - bytes <-> bits: 8 bits per byte, most significant first
//! - text <-> bits: UTF-8 bytes, lossy decode on the way back
//! - hex <-> bits: 4 bits per digit, leading zeros preserved

use crate::error::{CodecError, Encoding};
use std::fmt;
use std::ops::{Deref, Range};
use std::str::FromStr;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// An owned bit sequence, most significant bit first.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bits(Vec<bool>);

impl Bits {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Creates `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn push(&mut self, bit: bool) {
        self.0.push(bit);
    }

    pub fn extend_from_slice(&mut self, bits: &[bool]) {
        self.0.extend_from_slice(bits);
    }

    /// Appends the low `width` bits of `value`, most significant first.
    pub fn push_uint(&mut self, value: u64, width: usize) {
        debug_assert!(width <= 64);
        for shift in (0..width).rev() {
            self.0.push((value >> shift) & 1 == 1);
        }
    }

    /// Appends zero bits until the sequence is `len` bits long.
    pub fn pad_to(&mut self, len: usize) {
        if self.0.len() < len {
            self.0.resize(len, false);
        }
    }

    /// Inverts the bit at `index`. Returns false if `index` is out of range.
    pub fn flip(&mut self, index: usize) -> bool {
        match self.0.get_mut(index) {
            Some(bit) => {
                *bit = !*bit;
                true
            }
            None => false,
        }
    }

    /// Copies out a sub-range.
    pub fn slice(&self, range: Range<usize>) -> Bits {
        Self(self.0[range].to_vec())
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&bit| bit).count()
    }
}

/// Reads an unsigned integer from at most 64 bits, most significant first.
pub fn read_uint(bits: &[bool]) -> u64 {
    debug_assert!(bits.len() <= 64);
    bits.iter()
        .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit))
}

impl Deref for Bits {
    type Target = [bool];

    fn deref(&self) -> &[bool] {
        &self.0
    }
}

impl AsRef<[bool]> for Bits {
    fn as_ref(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for Bits {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl From<&[bool]> for Bits {
    fn from(bits: &[bool]) -> Self {
        Self(bits.to_vec())
    }
}

impl FromIterator<bool> for Bits {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self.0.iter().map(|&b| if b { '1' } else { '0' }).collect();
        f.write_str(&text)
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bits({})", self)
    }
}

impl FromStr for Bits {
    type Err = CodecError;

    /// Parses a string of `0`/`1`, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .chars()
            .enumerate()
            .map(|(index, c)| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                found => Err(CodecError::InvalidEncoding {
                    encoding: Encoding::Binary,
                    index,
                    found,
                }),
            })
            .collect()
    }
}

/// Expands every byte into 8 bits, most significant first.
pub fn bytes_to_bits(bytes: &[u8]) -> Bits {
    let mut bits = Bits::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        bits.push_uint(u64::from(byte), 8);
    }
    bits
}

/// Groups bits into bytes.
///
/// A trailing group shorter than 8 bits is padded on the right with zeros, so
/// the round trip through [`bytes_to_bits`] is only exact for lengths that
/// are a multiple of 8.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|group| {
            let value = read_uint(group) as u8;
            value << (8 - group.len())
        })
        .collect()
}

pub fn text_to_bits(text: &str) -> Bits {
    bytes_to_bits(text.as_bytes())
}

/// Decodes bits as UTF-8, replacing invalid sequences with U+FFFD.
pub fn bits_to_text(bits: &[bool]) -> String {
    String::from_utf8_lossy(&bits_to_bytes(bits)).into_owned()
}

/// Converts hex digits to bits, 4 per digit.
///
/// Surrounding whitespace, an optional `0x` prefix and the separators
/// `_`, `:`, `-` and space are ignored.
pub fn hex_to_bits(hex: &str) -> Result<Bits, CodecError> {
    let hex = hex.trim();
    let (offset, body) = match hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")) {
        Some(rest) => (2, rest),
        None => (0, hex),
    };

    let mut bits = Bits::with_capacity(body.len() * 4);
    for (i, c) in body.chars().enumerate() {
        if matches!(c, '_' | ':' | '-' | ' ') {
            continue;
        }
        let digit = c.to_digit(16).ok_or(CodecError::InvalidEncoding {
            encoding: Encoding::Hex,
            index: offset + i,
            found: c,
        })?;
        bits.push_uint(u64::from(digit), 4);
    }
    Ok(bits)
}

/// Converts bits to upper-case hex, left-padding to a whole nibble.
pub fn bits_to_hex(bits: &[bool]) -> String {
    let pad = (4 - bits.len() % 4) % 4;
    let mut padded = Bits::zeros(pad);
    padded.extend_from_slice(bits);

    padded
        .chunks(4)
        .map(|nibble| char::from(HEX_DIGITS[read_uint(nibble) as usize]))
        .collect()
}
