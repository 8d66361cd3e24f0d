//! Receiving driver: transport -> validated frames -> reassembled payload.

use crate::error::LinkError;
use crate::transport::BitSource;
use linkframe_codec::{
    bits_to_bytes, Bits, Frame, InvalidFramePolicy, Reassembler, ReassemblyStats,
};
use std::path::Path;
use tracing::{info, warn};

/// What a receive produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveReport {
    pub payload: Bits,
    pub stats: ReassemblyStats,
    /// Lines that did not parse as frames.
    pub malformed: usize,
    /// Whether the terminal frame arrived.
    pub complete: bool,
}

impl ReceiveReport {
    pub fn payload_bytes(&self) -> Vec<u8> {
        bits_to_bytes(&self.payload)
    }
}

/// Reads frames until the terminal frame or end of stream.
pub async fn receive_stream<S: BitSource>(
    source: &mut S,
    policy: InvalidFramePolicy,
) -> Result<ReceiveReport, LinkError> {
    let mut reassembler = Reassembler::new(policy);
    let mut malformed = 0;

    while !reassembler.is_complete() {
        let bits = match source.receive_bits().await {
            Ok(Some(bits)) => bits,
            Ok(None) => {
                warn!(
                    frames = reassembler.stats().frames(),
                    "Stream ended before the last frame"
                );
                break;
            }
            Err(LinkError::Codec(e)) => {
                malformed += 1;
                warn!(error = %e, "Skipping line that is not a bit-string");
                continue;
            }
            Err(e) => return Err(e),
        };

        match Frame::parse(bits) {
            Ok(frame) => {
                reassembler.push(&frame);
            }
            Err(e) => {
                malformed += 1;
                warn!(error = %e, "Skipping malformed frame");
            }
        }
    }

    let stats = reassembler.stats();
    let complete = reassembler.is_complete();
    info!(
        valid = stats.valid,
        invalid = stats.invalid,
        undetermined = stats.undetermined,
        malformed,
        complete,
        "Receive finished"
    );

    Ok(ReceiveReport {
        payload: reassembler.into_payload(),
        stats,
        malformed,
        complete,
    })
}

/// Receives a stream and writes the reassembled bytes to `path`.
pub async fn receive_to_file<S: BitSource>(
    source: &mut S,
    policy: InvalidFramePolicy,
    path: impl AsRef<Path>,
) -> Result<ReceiveReport, LinkError> {
    let path = path.as_ref();
    let report = receive_stream(source, policy).await?;
    let bytes = report.payload_bytes();
    tokio::fs::write(path, &bytes).await?;
    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{encode_line, memory_link, BitSink, LineSource};
    use linkframe_codec::{segment, text_to_bits, Address, Scheme};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_incomplete_stream() {
        let (mut sink, mut source) = memory_link();
        sink.finish().await.unwrap();

        let report = receive_stream(&mut source, InvalidFramePolicy::Drop)
            .await
            .unwrap();
        assert!(!report.complete);
        assert!(report.payload.is_empty());
        assert_eq!(report.stats.frames(), 0);
    }

    #[tokio::test]
    async fn test_short_lines_are_malformed() {
        let (mut sink, mut source) = memory_link();
        sink.send_bits(&Bits::zeros(40)).await.unwrap();
        sink.finish().await.unwrap();

        let report = receive_stream(&mut source, InvalidFramePolicy::Drop)
            .await
            .unwrap();
        assert_eq!(report.malformed, 1);
        assert!(!report.complete);
    }

    #[tokio::test]
    async fn test_non_binary_line_is_skipped() {
        let (mut tx, rx) = tokio::io::duplex(4096);
        let payload = text_to_bits("after the noise");
        let frames = segment(
            &payload,
            Address::default(),
            Address::default(),
            Scheme::Crc8,
            24,
        )
        .unwrap();

        tx.write_all(b"01x1\n").await.unwrap();
        for frame in frames {
            tx.write_all(&encode_line(frame.as_bits())).await.unwrap();
        }
        drop(tx);

        let mut source = LineSource::new(rx);
        let report = receive_stream(&mut source, InvalidFramePolicy::Drop)
            .await
            .unwrap();
        assert_eq!(report.malformed, 1);
        assert!(report.complete);
        assert_eq!(report.stats.invalid, 0);
        assert_eq!(report.payload, payload);
    }
}
