//! Link frame format.
//!
//! Frame layout (120-bit header + payload region + redundancy code), bit
//! offsets MSB first:
//!
//! ```text
//! +-----------+-------------+-------------+---------------+-------------+--------+--------+
//! | sender ip | sender port | receiver ip | receiver port | payload_len | isLast | scheme |
//! |  32 bits  |   16 bits   |   32 bits   |    16 bits    |   16 bits   | 1 bit  | 7 bits |
//! +-----------+-------------+-------------+---------------+-------------+--------+--------+
//! | payload + zero padding (chunk bits)       | redundancy code (0, 8, 10, 16 or 32 bits) |
//! +-------------------------------------------+-------------------------------------------+
//! ```
//!
//! The code is computed over every bit that precedes it.

use crate::bits::{read_uint, Bits};
use crate::error::CodecError;
use crate::redundancy::{Code, Scheme};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

pub const IP_BITS: usize = 32;
pub const PORT_BITS: usize = 16;
pub const LENGTH_BITS: usize = 16;
pub const FLAG_BITS: usize = 1;
pub const SCHEME_TAG_BITS: usize = 7;
/// Largest tag the 7-bit scheme field can carry.
pub const MAX_SCHEME_TAG: u8 = (1 << SCHEME_TAG_BITS) - 1;

/// Size of the fixed frame header in bits (32+16+32+16+16+1+7 = 120).
pub const HEADER_BITS: usize =
    2 * (IP_BITS + PORT_BITS) + LENGTH_BITS + FLAG_BITS + SCHEME_TAG_BITS;

const SENDER_OFFSET: usize = 0;
const RECEIVER_OFFSET: usize = SENDER_OFFSET + IP_BITS + PORT_BITS;
const LENGTH_OFFSET: usize = RECEIVER_OFFSET + IP_BITS + PORT_BITS;
const FLAG_OFFSET: usize = LENGTH_OFFSET + LENGTH_BITS;
const SCHEME_OFFSET: usize = FLAG_OFFSET + FLAG_BITS;

/// An IPv4 endpoint as carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Address {
    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    fn pack_into(&self, out: &mut Bits) {
        out.push_uint(u64::from(u32::from(self.ip)), IP_BITS);
        out.push_uint(u64::from(self.port), PORT_BITS);
    }

    fn unpack(bits: &[bool]) -> Self {
        let ip = Ipv4Addr::from(read_uint(&bits[..IP_BITS]) as u32);
        let port = read_uint(&bits[IP_BITS..IP_BITS + PORT_BITS]) as u16;
        Self { ip, port }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new(Ipv4Addr::LOCALHOST, 0)
    }
}

impl From<SocketAddrV4> for Address {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> Self {
        SocketAddr::V4(SocketAddrV4::new(addr.ip, addr.port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for Address {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<SocketAddrV4>()
            .map(Address::from)
            .map_err(|_| CodecError::InvalidAddress(s.to_string()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sender: Address,
    pub receiver: Address,
    /// Payload bits in this frame, before padding.
    pub payload_len: u16,
    pub is_last: bool,
    pub scheme: Scheme,
}

impl FrameHeader {
    /// Appends the 120 header bits to `out`.
    ///
    /// Fails with `UnsupportedScheme` when the scheme tag does not fit in
    /// 7 bits; nothing is written in that case.
    pub fn pack_into(&self, out: &mut Bits) -> Result<(), CodecError> {
        let tag = self.scheme.tag();
        if tag > MAX_SCHEME_TAG {
            return Err(CodecError::UnsupportedScheme(tag));
        }
        self.write_into(out);
        Ok(())
    }

    /// Tag must fit the scheme field.
    fn write_into(&self, out: &mut Bits) {
        self.sender.pack_into(out);
        self.receiver.pack_into(out);
        out.push_uint(u64::from(self.payload_len), LENGTH_BITS);
        out.push(self.is_last);
        out.push_uint(u64::from(self.scheme.tag()), SCHEME_TAG_BITS);
    }

    pub fn to_bits(&self) -> Result<Bits, CodecError> {
        let mut bits = Bits::with_capacity(HEADER_BITS);
        self.pack_into(&mut bits)?;
        Ok(bits)
    }

    /// Decodes the header from the first 120 bits.
    pub fn unpack(bits: &[bool]) -> Result<Self, CodecError> {
        if bits.len() < HEADER_BITS {
            return Err(CodecError::TruncatedFrame {
                len: bits.len(),
                min: HEADER_BITS,
            });
        }

        Ok(Self {
            sender: Address::unpack(&bits[SENDER_OFFSET..RECEIVER_OFFSET]),
            receiver: Address::unpack(&bits[RECEIVER_OFFSET..LENGTH_OFFSET]),
            payload_len: read_uint(&bits[LENGTH_OFFSET..FLAG_OFFSET]) as u16,
            is_last: bits[FLAG_OFFSET],
            scheme: Scheme::from_tag(read_uint(&bits[SCHEME_OFFSET..HEADER_BITS]) as u8),
        })
    }
}

/// Minimum serialized length for a frame declaring `scheme`, and the width
/// of its trailing code. Unknown schemes carry no known code, so the header
/// alone is enough.
fn layout_for(scheme: Scheme) -> (usize, usize) {
    match scheme.redundancy_bits() {
        Ok(width) => (HEADER_BITS + width, width),
        Err(_) => (HEADER_BITS, 0),
    }
}

/// A frame split into its three regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFields {
    pub header: FrameHeader,
    /// Payload followed by its zero padding.
    pub body: Bits,
    pub code: Bits,
}

impl FrameFields {
    /// Concatenates header, body and code in wire order.
    pub fn pack(&self) -> Result<Bits, CodecError> {
        let mut bits = Bits::with_capacity(HEADER_BITS + self.body.len() + self.code.len());
        self.header.pack_into(&mut bits)?;
        bits.extend_from_slice(&self.body);
        bits.extend_from_slice(&self.code);
        Ok(bits)
    }

    /// Slices a raw frame by the fixed offsets.
    pub fn unpack(bits: &[bool]) -> Result<Self, CodecError> {
        let header = FrameHeader::unpack(bits)?;
        let (min, code_width) = layout_for(header.scheme);
        if bits.len() < min {
            return Err(CodecError::TruncatedFrame {
                len: bits.len(),
                min,
            });
        }

        let code_start = bits.len() - code_width;
        Ok(Self {
            header,
            body: Bits::from(&bits[HEADER_BITS..code_start]),
            code: Bits::from(&bits[code_start..]),
        })
    }
}

/// A serialized link frame together with its decoded header.
///
/// Frames are immutable. Corrupting one means editing a copy of its bits and
/// parsing the result as a new frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    code_width: usize,
    bits: Bits,
}

impl Frame {
    /// Builds a frame whose payload region is `chunk_bits` wide.
    pub fn build(
        sender: Address,
        receiver: Address,
        payload: &[bool],
        chunk_bits: usize,
        is_last: bool,
        scheme: Scheme,
    ) -> Result<Self, CodecError> {
        let code = scheme.code()?;
        if payload.len() > chunk_bits {
            return Err(CodecError::PayloadTooLong {
                len: payload.len(),
                chunk_bits,
            });
        }
        let payload_len = u16::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLong {
            len: payload.len(),
            chunk_bits: usize::from(u16::MAX),
        })?;

        let header = FrameHeader {
            sender,
            receiver,
            payload_len,
            is_last,
            scheme,
        };
        Ok(Self::assemble(header, payload, chunk_bits, code))
    }

    /// Packs the header, pads the payload to `chunk_bits` and appends the
    /// code. `payload` must already fit the chunk.
    pub(crate) fn assemble(
        header: FrameHeader,
        payload: &[bool],
        chunk_bits: usize,
        code: Code,
    ) -> Self {
        let protected = HEADER_BITS + chunk_bits;
        let mut bits = Bits::with_capacity(protected + code.width());
        // Known schemes only, so the tag fits.
        header.write_into(&mut bits);
        bits.extend_from_slice(payload);
        bits.pad_to(protected);

        let redundancy = code.generate(&bits);
        bits.extend_from_slice(&redundancy);

        Self {
            header,
            code_width: code.width(),
            bits,
        }
    }

    /// Parses a received bit-string.
    pub fn parse(bits: Bits) -> Result<Self, CodecError> {
        let header = FrameHeader::unpack(&bits)?;
        let (min, code_width) = layout_for(header.scheme);
        if bits.len() < min {
            return Err(CodecError::TruncatedFrame {
                len: bits.len(),
                min,
            });
        }

        Ok(Self {
            header,
            code_width,
            bits,
        })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn sender(&self) -> Address {
        self.header.sender
    }

    pub fn receiver(&self) -> Address {
        self.header.receiver
    }

    pub fn payload_len(&self) -> u16 {
        self.header.payload_len
    }

    pub fn is_last(&self) -> bool {
        self.header.is_last
    }

    pub fn scheme(&self) -> Scheme {
        self.header.scheme
    }

    /// Payload plus padding.
    pub fn payload_region(&self) -> &[bool] {
        &self.bits[HEADER_BITS..self.code_start()]
    }

    /// The payload bits the header claims, clamped to the payload region.
    pub fn data(&self) -> &[bool] {
        let region = self.payload_region();
        let len = usize::from(self.header.payload_len).min(region.len());
        &region[..len]
    }

    pub fn redundancy_code(&self) -> &[bool] {
        &self.bits[self.code_start()..]
    }

    pub fn fields(&self) -> FrameFields {
        FrameFields {
            header: self.header,
            body: Bits::from(self.payload_region()),
            code: Bits::from(self.redundancy_code()),
        }
    }

    pub fn as_bits(&self) -> &Bits {
        &self.bits
    }

    pub fn into_bits(self) -> Bits {
        self.bits
    }

    /// Serialized length in bits.
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    fn code_start(&self) -> usize {
        self.bits.len() - self.code_width
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.bits, f)
    }
}

impl FromStr for Frame {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frame::parse(s.parse()?)
    }
}
