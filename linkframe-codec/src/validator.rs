//! Frame validation and in-order reassembly.
//!
//! Validation recomputes the declared code over the full serialized frame;
//! the transmitted code is never trusted. A frame whose tag names no known
//! scheme cannot be checked and is reported as [`Validity::Undetermined`].

use crate::bits::Bits;
use crate::error::CodecError;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Outcome of validating one received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid,
    Undetermined,
}

impl Validity {
    /// Turns anything but `Valid` into `DetectedCorruption` for frame `index`.
    pub fn require_valid(self, index: usize) -> Result<(), CodecError> {
        match self {
            Validity::Valid => Ok(()),
            Validity::Invalid | Validity::Undetermined => {
                Err(CodecError::DetectedCorruption { index })
            }
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::Valid => write!(f, "valid"),
            Validity::Invalid => write!(f, "invalid"),
            Validity::Undetermined => write!(f, "undetermined"),
        }
    }
}

pub fn validate(frame: &Frame) -> Validity {
    match frame.scheme().code() {
        Ok(code) if code.verify(frame.as_bits()) => Validity::Valid,
        Ok(_) => Validity::Invalid,
        Err(_) => Validity::Undetermined,
    }
}

/// Parses a raw bit-string and validates it.
pub fn validate_bits(bits: Bits) -> Result<(Frame, Validity), CodecError> {
    let frame = Frame::parse(bits)?;
    let validity = validate(&frame);
    Ok((frame, validity))
}

impl Frame {
    pub fn validate(&self) -> Validity {
        validate(self)
    }
}

/// What to do with the data of a frame that did not validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidFramePolicy {
    /// Discard the frame's data.
    #[default]
    Drop,
    /// Keep the frame's data as received.
    Append,
}

impl fmt::Display for InvalidFramePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidFramePolicy::Drop => write!(f, "drop"),
            InvalidFramePolicy::Append => write!(f, "append"),
        }
    }
}

impl FromStr for InvalidFramePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(InvalidFramePolicy::Drop),
            "append" | "keep" => Ok(InvalidFramePolicy::Append),
            other => Err(format!("unknown invalid-frame policy: {other:?}")),
        }
    }
}

/// Frame counters kept by a [`Reassembler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReassemblyStats {
    pub valid: usize,
    pub invalid: usize,
    pub undetermined: usize,
    /// Frames pushed after the terminal frame.
    pub ignored: usize,
}

impl ReassemblyStats {
    /// Frames that were part of the stream.
    pub fn frames(&self) -> usize {
        self.valid + self.invalid + self.undetermined
    }
}

/// Rebuilds a payload from frames in arrival order.
///
/// The stream ends at the first frame whose header sets `isLast`, whether or
/// not that frame validated.
#[derive(Debug, Default)]
pub struct Reassembler {
    policy: InvalidFramePolicy,
    payload: Bits,
    stats: ReassemblyStats,
    complete: bool,
}

impl Reassembler {
    pub fn new(policy: InvalidFramePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Validates `frame` and applies it to the payload.
    pub fn push(&mut self, frame: &Frame) -> Validity {
        let index = self.stats.frames();
        let validity = frame.validate();

        if self.complete {
            self.stats.ignored += 1;
            warn!(index, "Frame received after end of stream, ignoring");
            return validity;
        }

        let keep = match validity {
            Validity::Valid => {
                self.stats.valid += 1;
                true
            }
            Validity::Invalid => {
                self.stats.invalid += 1;
                warn!(index, policy = %self.policy, "Corrupted frame");
                self.policy == InvalidFramePolicy::Append
            }
            Validity::Undetermined => {
                self.stats.undetermined += 1;
                warn!(
                    index,
                    scheme = %frame.scheme(),
                    policy = %self.policy,
                    "Frame declares an unknown redundancy scheme"
                );
                self.policy == InvalidFramePolicy::Append
            }
        };

        if keep {
            self.payload.extend_from_slice(frame.data());
        }
        debug!(
            index,
            %validity,
            payload_len = frame.payload_len(),
            is_last = frame.is_last(),
            "Frame processed"
        );

        if frame.is_last() {
            self.complete = true;
        }
        validity
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    pub fn payload(&self) -> &Bits {
        &self.payload
    }

    pub fn into_payload(self) -> Bits {
        self.payload
    }
}
