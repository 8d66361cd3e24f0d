//! Sending driver: payload -> frames -> transport.

use crate::config::Config;
use crate::error::LinkError;
use crate::transport::BitSink;
use linkframe_codec::{bytes_to_bits, segment, Scheme};
use std::path::Path;
use tracing::{debug, info};

/// What a send produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub scheme: Scheme,
    pub frames: usize,
    pub payload_bits: usize,
    /// Serialized length of each frame.
    pub frame_bits: usize,
}

impl SendReport {
    /// Bits put on the wire, excluding line terminators.
    pub fn wire_bits(&self) -> usize {
        self.frames * self.frame_bits
    }
}

/// Segments `payload` and sends every frame in order.
///
/// The sink is left open; call [`BitSink::finish`] once the stream is done.
pub async fn send_payload<S: BitSink>(
    sink: &mut S,
    payload: &[bool],
    config: &Config,
) -> Result<SendReport, LinkError> {
    let framing = &config.framing;
    let addressing = &config.addressing;
    let segmenter = segment(
        payload,
        addressing.sender,
        addressing.receiver,
        framing.scheme,
        framing.frame_size_bytes,
    )?;

    let report = SendReport {
        scheme: framing.scheme,
        frames: segmenter.frame_count(),
        payload_bits: payload.len(),
        frame_bits: segmenter.frame_bits(),
    };
    info!(
        frames = report.frames,
        payload_bits = report.payload_bits,
        scheme = %report.scheme,
        "Sending payload"
    );

    for (index, frame) in segmenter.enumerate() {
        sink.send_bits(frame.as_bits()).await?;
        debug!(
            index,
            payload_len = frame.payload_len(),
            is_last = frame.is_last(),
            "Frame sent"
        );
    }
    Ok(report)
}

/// Sends the raw bytes of the file at `path`, then closes the sink.
pub async fn send_file<S: BitSink>(
    sink: &mut S,
    path: impl AsRef<Path>,
    config: &Config,
) -> Result<SendReport, LinkError> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    info!("Read {} bytes from {}", data.len(), path.display());

    let report = send_payload(sink, &bytes_to_bits(&data), config).await?;
    sink.finish().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{memory_link, BitSource};
    use linkframe_codec::{text_to_bits, Frame};

    #[tokio::test]
    async fn test_send_payload_report() {
        let (mut sink, mut source) = memory_link();
        let mut config = Config::default();
        config.framing.scheme = Scheme::Crc8;
        config.framing.frame_size_bytes = 32;

        let payload = text_to_bits("A");
        let report = send_payload(&mut sink, &payload, &config).await.unwrap();
        sink.finish().await.unwrap();

        assert_eq!(report.frames, 1);
        assert_eq!(report.payload_bits, 8);
        assert_eq!(report.frame_bits, 256);
        assert_eq!(report.wire_bits(), 256);

        let bits = source.receive_bits().await.unwrap().unwrap();
        let frame = Frame::parse(bits).unwrap();
        assert_eq!(frame.data(), payload.as_slice());
        assert_eq!(frame.receiver(), config.addressing.receiver);
        assert!(source.receive_bits().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_rejects_small_frames() {
        let (mut sink, _source) = memory_link();
        let mut config = Config::default();
        config.framing.frame_size_bytes = 8;

        let err = send_payload(&mut sink, &[], &config).await.unwrap_err();
        assert!(matches!(err, LinkError::Codec(_)));
        assert_eq!(sink.frames_sent(), 0);
    }
}
