//! Error-detecting codes.
//!
//! Two families are supported:
//! - CRC over a fixed generator polynomial, computed by binary long division
//!   on the bit sequence
//! - a 16-bit one's-complement checksum with end-around carry
//!
//! A frame names its code through a 7-bit [`Scheme`] tag. Tags that are not
//! in the table decode to [`Scheme::Unknown`] so a receiver can still report
//! on the frame; asking such a scheme for a code fails with
//! [`CodecError::UnsupportedScheme`].

use crate::bits::Bits;
use crate::error::CodecError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of the checksum code in bits.
pub const CHECKSUM_BITS: usize = 16;

/// A CRC generator polynomial, including its leading 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Polynomial {
    value: u64,
    bit_len: usize,
}

impl Polynomial {
    pub const fn new(value: u64, bit_len: usize) -> Self {
        Self { value, bit_len }
    }

    /// Number of bits in the generator, leading 1 included.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Degree of the polynomial, which is also the width of its code.
    pub fn degree(&self) -> usize {
        self.bit_len - 1
    }

    /// Coefficient at `index`, counting from the most significant term.
    pub fn bit(&self, index: usize) -> bool {
        (self.value >> (self.bit_len - 1 - index)) & 1 == 1
    }

    pub fn to_bits(&self) -> Bits {
        let mut bits = Bits::with_capacity(self.bit_len);
        bits.push_uint(self.value, self.bit_len);
        bits
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bits())
    }
}

/// `111010101`
pub const CRC8_POLY: Polynomial = Polynomial::new(0b1_1101_0101, 9);
/// `11000110011`
pub const CRC10_POLY: Polynomial = Polynomial::new(0b110_0011_0011, 11);
/// `11000000000000101`
pub const CRC16_POLY: Polynomial = Polynomial::new(0b1_1000_0000_0000_0101, 17);
/// `100000100110000010001110110110111`
pub const CRC32_POLY: Polynomial =
    Polynomial::new(0b1_0000_0100_1100_0001_0001_1101_1011_0111, 33);

/// Redundancy scheme carried in a frame header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    Checksum,
    Crc8,
    Crc10,
    #[default]
    Crc16,
    Crc32,
    /// A tag outside the table, kept verbatim.
    Unknown(u8),
}

impl Scheme {
    /// Every scheme that can generate a code.
    pub const SUPPORTED: [Scheme; 5] = [
        Scheme::Checksum,
        Scheme::Crc8,
        Scheme::Crc10,
        Scheme::Crc16,
        Scheme::Crc32,
    ];

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Scheme::Checksum,
            1 => Scheme::Crc8,
            2 => Scheme::Crc10,
            3 => Scheme::Crc16,
            4 => Scheme::Crc32,
            other => Scheme::Unknown(other),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Scheme::Checksum => 0,
            Scheme::Crc8 => 1,
            Scheme::Crc10 => 2,
            Scheme::Crc16 => 3,
            Scheme::Crc32 => 4,
            Scheme::Unknown(tag) => *tag,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Checksum => "checksum",
            Scheme::Crc8 => "crc-8",
            Scheme::Crc10 => "crc-10",
            Scheme::Crc16 => "crc-16",
            Scheme::Crc32 => "crc-32",
            Scheme::Unknown(_) => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Scheme::Unknown(_))
    }

    /// Resolves the scheme to its code.
    pub fn code(&self) -> Result<Code, CodecError> {
        match self {
            Scheme::Checksum => Ok(Code::Checksum),
            Scheme::Crc8 => Ok(Code::Crc(CRC8_POLY)),
            Scheme::Crc10 => Ok(Code::Crc(CRC10_POLY)),
            Scheme::Crc16 => Ok(Code::Crc(CRC16_POLY)),
            Scheme::Crc32 => Ok(Code::Crc(CRC32_POLY)),
            Scheme::Unknown(tag) => Err(CodecError::UnsupportedScheme(*tag)),
        }
    }

    /// Width of the trailing code in bits.
    pub fn redundancy_bits(&self) -> Result<usize, CodecError> {
        Ok(self.code()?.width())
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Unknown(tag) => write!(f, "unknown({:#04x})", tag),
            known => f.write_str(known.name()),
        }
    }
}

impl FromStr for Scheme {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checksum" => Ok(Scheme::Checksum),
            "crc-8" | "crc8" => Ok(Scheme::Crc8),
            "crc-10" | "crc10" => Ok(Scheme::Crc10),
            "crc-16" | "crc16" => Ok(Scheme::Crc16),
            "crc-32" | "crc32" => Ok(Scheme::Crc32),
            _ => Err(CodecError::UnknownSchemeName(s.to_string())),
        }
    }
}

impl Serialize for Scheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A resolved error-detecting code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Checksum,
    Crc(Polynomial),
}

impl Code {
    /// Width of the generated code in bits.
    pub fn width(&self) -> usize {
        match self {
            Code::Checksum => CHECKSUM_BITS,
            Code::Crc(poly) => poly.degree(),
        }
    }

    /// Computes the code for `bits`.
    pub fn generate(&self, bits: &[bool]) -> Bits {
        match self {
            Code::Checksum => checksum::generate(bits),
            Code::Crc(poly) => crc::generate(bits, poly),
        }
    }

    /// Checks `framed`, which is the protected data followed by its code.
    pub fn verify(&self, framed: &[bool]) -> bool {
        match self {
            Code::Checksum => checksum::verify(framed),
            Code::Crc(poly) => crc::verify(framed, poly),
        }
    }
}

/// Computes the code of `scheme` over `bits`.
pub fn generate(scheme: Scheme, bits: &[bool]) -> Result<Bits, CodecError> {
    Ok(scheme.code()?.generate(bits))
}

/// Verifies `framed` (data followed by its code) under `scheme`.
pub fn verify(scheme: Scheme, framed: &[bool]) -> Result<bool, CodecError> {
    Ok(scheme.code()?.verify(framed))
}

/// Cyclic redundancy check by polynomial long division over GF(2).
pub mod crc {
    use super::Polynomial;
    use crate::bits::Bits;

    /// Appends `degree` zeros to `bits`, divides, and returns the remainder.
    pub fn generate(bits: &[bool], poly: &Polynomial) -> Bits {
        let width = poly.degree();
        let mut buf = Vec::with_capacity(bits.len() + width);
        buf.extend_from_slice(bits);
        buf.resize(bits.len() + width, false);

        divide(&mut buf, bits.len(), poly);
        Bits::from(buf.split_off(bits.len()))
    }

    /// Divides the whole received sequence and returns its remainder.
    ///
    /// Returns `None` when `framed` is shorter than the code.
    pub fn remainder(framed: &[bool], poly: &Polynomial) -> Option<Bits> {
        let width = poly.degree();
        let steps = framed.len().checked_sub(width)?;
        let mut buf = framed.to_vec();

        divide(&mut buf, steps, poly);
        Some(Bits::from(buf.split_off(steps)))
    }

    /// True iff the remainder of `framed` is all zeros.
    pub fn verify(framed: &[bool], poly: &Polynomial) -> bool {
        remainder(framed, poly).is_some_and(|rem| !rem.contains(&true))
    }

    /// XORs the generator in at every one of the first `steps` positions
    /// that holds a 1. `buf` must hold `steps + degree` bits.
    fn divide(buf: &mut [bool], steps: usize, poly: &Polynomial) {
        debug_assert_eq!(buf.len(), steps + poly.degree());
        for i in 0..steps {
            if buf[i] {
                for j in 0..poly.bit_len() {
                    buf[i + j] ^= poly.bit(j);
                }
            }
        }
    }
}

/// 16-bit one's-complement checksum.
pub mod checksum {
    use super::CHECKSUM_BITS;
    use crate::bits::{read_uint, Bits};

    /// Sums 16-bit words with end-around carry and complements the result.
    ///
    /// The input is treated as left-padded with zeros to a multiple of 16.
    pub fn compute(bits: &[bool]) -> u16 {
        let head = bits.len() % CHECKSUM_BITS;
        let (first, rest) = bits.split_at(head);

        let mut sum: u32 = 0;
        for word in std::iter::once(first)
            .filter(|w| !w.is_empty())
            .chain(rest.chunks(CHECKSUM_BITS))
        {
            sum += read_uint(word) as u32;
            if sum > 0xFFFF {
                sum = (sum & 0xFFFF) + 1;
            }
        }
        !(sum as u16)
    }

    pub fn generate(bits: &[bool]) -> Bits {
        let mut code = Bits::with_capacity(CHECKSUM_BITS);
        code.push_uint(u64::from(compute(bits)), CHECKSUM_BITS);
        code
    }

    /// Splits off the trailing 16 bits and compares them with a fresh sum
    /// over the rest.
    pub fn verify(data_with_checksum: &[bool]) -> bool {
        let Some(split) = data_with_checksum.len().checked_sub(CHECKSUM_BITS) else {
            return false;
        };
        let (data, received) = data_with_checksum.split_at(split);
        read_uint(received) as u16 == compute(data)
    }
}
