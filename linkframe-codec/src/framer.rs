//! Payload segmentation.
//!
//! A payload is cut into non-overlapping windows of `chunk_bits`, where
//!
//! ```text
//! chunk_bits = frame_size_bytes * 8 - HEADER_BITS - redundancy_bits
//! ```
//!
//! so every frame of a segmentation serializes to the same length. Only the
//! final frame sets `isLast`.

use crate::error::CodecError;
use crate::frame::{Address, Frame, FrameHeader, HEADER_BITS};
use crate::redundancy::{Code, Scheme};
use std::iter::FusedIterator;
use tracing::debug;

/// Largest payload region a 16-bit `payload_len` can describe.
pub const MAX_CHUNK_BITS: usize = u16::MAX as usize;

/// Payload bits available per frame for the given byte budget and scheme.
pub fn chunk_bits(frame_size_bytes: usize, scheme: Scheme) -> Result<usize, CodecError> {
    let redundancy = scheme.redundancy_bits()?;
    let total = frame_size_bytes
        .checked_mul(8)
        .ok_or(CodecError::FrameTooLarge {
            frame_size_bytes,
            chunk_bits: usize::MAX,
            max: MAX_CHUNK_BITS,
        })?;
    let chunk = total
        .checked_sub(HEADER_BITS + redundancy)
        .filter(|&chunk| chunk > 0)
        .ok_or(CodecError::FrameTooSmall {
            frame_size_bytes,
            scheme,
        })?;

    if chunk > MAX_CHUNK_BITS {
        return Err(CodecError::FrameTooLarge {
            frame_size_bytes,
            chunk_bits: chunk,
            max: MAX_CHUNK_BITS,
        });
    }
    Ok(chunk)
}

/// Lazily yields the frames of one payload, in order.
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    payload: &'a [bool],
    sender: Address,
    receiver: Address,
    scheme: Scheme,
    code: Code,
    chunk_bits: usize,
    total: usize,
    next: usize,
}

impl<'a> Segmenter<'a> {
    pub fn new(
        payload: &'a [bool],
        sender: Address,
        receiver: Address,
        scheme: Scheme,
        frame_size_bytes: usize,
    ) -> Result<Self, CodecError> {
        let chunk_bits = chunk_bits(frame_size_bytes, scheme)?;
        let code = scheme.code()?;
        let total = payload.len().div_ceil(chunk_bits).max(1);

        debug!(
            payload_bits = payload.len(),
            chunk_bits,
            frames = total,
            %scheme,
            "Segmenting payload"
        );

        Ok(Self {
            payload,
            sender,
            receiver,
            scheme,
            code,
            chunk_bits,
            total,
            next: 0,
        })
    }

    pub fn chunk_bits(&self) -> usize {
        self.chunk_bits
    }

    /// Serialized length shared by every frame of this segmentation.
    pub fn frame_bits(&self) -> usize {
        HEADER_BITS + self.chunk_bits + self.code.width()
    }

    /// Number of frames the whole segmentation produces.
    pub fn frame_count(&self) -> usize {
        self.total
    }
}

impl Iterator for Segmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.next >= self.total {
            return None;
        }

        let start = (self.next * self.chunk_bits).min(self.payload.len());
        let end = (start + self.chunk_bits).min(self.payload.len());
        let window = &self.payload[start..end];
        self.next += 1;

        let header = FrameHeader {
            sender: self.sender,
            receiver: self.receiver,
            // chunk_bits never exceeds u16::MAX
            payload_len: window.len() as u16,
            is_last: self.next == self.total,
            scheme: self.scheme,
        };
        Some(Frame::assemble(header, window, self.chunk_bits, self.code))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Segmenter<'_> {}

impl FusedIterator for Segmenter<'_> {}

/// Splits `payload` into frames of `frame_size_bytes` each.
pub fn segment(
    payload: &[bool],
    sender: Address,
    receiver: Address,
    scheme: Scheme,
    frame_size_bytes: usize,
) -> Result<Segmenter<'_>, CodecError> {
    Segmenter::new(payload, sender, receiver, scheme, frame_size_bytes)
}
