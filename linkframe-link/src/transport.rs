//! Bit-string transport.
//!
//! Frames travel as lines of ASCII `0`/`1`, one frame per line, terminated
//! by `\n`. The same line codec runs over a TCP connection or over an
//! in-memory duplex pipe.

use crate::error::LinkError;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use linkframe_codec::Bits;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};

/// Longest line accepted by a [`LineSource`] (128 KiB).
///
/// The largest frame is 120 + 65535 + 32 bits, so this leaves headroom.
pub const MAX_LINE_LEN: usize = 128 * 1024;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Default in-memory pipe capacity (64 KiB).
pub const DEFAULT_MEMORY_CAPACITY: usize = 64 * 1024;

/// Outgoing half of a link.
#[async_trait]
pub trait BitSink: Send {
    /// Sends one frame's bits.
    async fn send_bits(&mut self, bits: &Bits) -> Result<(), LinkError>;

    /// Flushes and closes the outgoing direction.
    async fn finish(&mut self) -> Result<(), LinkError>;
}

/// Incoming half of a link.
#[async_trait]
pub trait BitSource: Send {
    /// Receives the next frame's bits, or `None` at end of stream.
    ///
    /// A line that is not a bit-string yields `LinkError::Codec`; the source
    /// stays usable afterwards.
    async fn receive_bits(&mut self) -> Result<Option<Bits>, LinkError>;
}

/// Splits a byte stream into lines.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: BytesMut,
    max_line_len: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_READ_BUFFER_SIZE),
            max_line_len,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Takes the next complete line, without its terminator.
    ///
    /// An overlong complete line is discarded before the error is returned,
    /// so decoding can continue with the next line.
    pub fn decode_line(&mut self) -> Result<Option<BytesMut>, LinkError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) if pos > self.max_line_len => {
                let _ = self.buffer.split_to(pos + 1);
                Err(LinkError::LineTooLong {
                    max: self.max_line_len,
                })
            }
            Some(pos) => {
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                Ok(Some(line))
            }
            None if self.buffer.len() > self.max_line_len => Err(LinkError::LineTooLong {
                max: self.max_line_len,
            }),
            None => Ok(None),
        }
    }

    /// Takes whatever is left once the stream has ended.
    pub fn take_remainder(&mut self) -> Option<BytesMut> {
        (!self.buffer.is_empty()).then(|| self.buffer.split())
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes bits as one wire line.
pub fn encode_line(bits: &[bool]) -> BytesMut {
    let mut line = BytesMut::with_capacity(bits.len() + 1);
    for &bit in bits {
        line.put_u8(if bit { b'1' } else { b'0' });
    }
    line.put_u8(b'\n');
    line
}

fn parse_line(line: &[u8]) -> Result<Bits, LinkError> {
    Ok(String::from_utf8_lossy(line).parse::<Bits>()?)
}

/// Writes frames as lines to any async writer.
#[derive(Debug)]
pub struct LineSink<W> {
    writer: W,
    frames_sent: usize,
    finished: bool,
}

impl<W: AsyncWrite + Unpin + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_sent: 0,
            finished: false,
        }
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }
}

fn closed_on_broken_pipe(e: std::io::Error) -> LinkError {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            LinkError::ConnectionClosed
        }
        _ => LinkError::Io(e),
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> BitSink for LineSink<W> {
    async fn send_bits(&mut self, bits: &Bits) -> Result<(), LinkError> {
        if self.finished {
            return Err(LinkError::ConnectionClosed);
        }
        let line = encode_line(bits);
        self.writer
            .write_all(&line)
            .await
            .map_err(closed_on_broken_pipe)?;
        self.writer.flush().await.map_err(closed_on_broken_pipe)?;
        self.frames_sent += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), LinkError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.flush().await.map_err(closed_on_broken_pipe)?;
        self.writer.shutdown().await.map_err(closed_on_broken_pipe)?;
        Ok(())
    }
}

/// Reads frames as lines from any async reader.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    decoder: LineDecoder,
    idle_timeout: Option<Duration>,
    eof: bool,
}

impl<R: AsyncRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: LineDecoder::new(),
            idle_timeout: None,
            eof: false,
        }
    }

    /// Fails a read that sees no data for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    async fn fill(&mut self) -> Result<usize, LinkError> {
        let read = self.reader.read_buf(self.decoder.buffer_mut());
        let n = match self.idle_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| LinkError::Timeout(timeout))??,
            None => read.await?,
        };
        Ok(n)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> BitSource for LineSource<R> {
    async fn receive_bits(&mut self) -> Result<Option<Bits>, LinkError> {
        loop {
            if let Some(line) = self.decoder.decode_line()? {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return parse_line(&line).map(Some);
            }

            if self.eof {
                return match self.decoder.take_remainder() {
                    Some(rest) if !rest.iter().all(u8::is_ascii_whitespace) => {
                        parse_line(&rest).map(Some)
                    }
                    _ => Ok(None),
                };
            }

            let n = self.fill().await?;
            if n == 0 {
                tracing::debug!(buffered = self.decoder.buffered(), "End of stream");
                self.eof = true;
            }
        }
    }
}

/// Sending end of a TCP link.
#[derive(Debug)]
pub struct TcpSender {
    sink: LineSink<TcpStream>,
    peer: SocketAddr,
}

impl TcpSender {
    /// Connects to `addr`, giving up after `connect_timeout`.
    pub async fn connect(addr: SocketAddr, connect_timeout: Duration) -> Result<Self, LinkError> {
        tracing::debug!("Connecting to {}...", addr);

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::debug!("Connection timeout");
                LinkError::Timeout(connect_timeout)
            })?
            .map_err(|e| {
                tracing::debug!("Connection failed: {}", e);
                LinkError::Io(e)
            })?;
        stream.set_nodelay(true)?;

        tracing::info!("Connected to {}", addr);
        Ok(Self {
            sink: LineSink::new(stream),
            peer: addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn frames_sent(&self) -> usize {
        self.sink.frames_sent()
    }
}

#[async_trait]
impl BitSink for TcpSender {
    async fn send_bits(&mut self, bits: &Bits) -> Result<(), LinkError> {
        self.sink.send_bits(bits).await
    }

    async fn finish(&mut self) -> Result<(), LinkError> {
        self.sink.finish().await
    }
}

/// Receiving end of a TCP link.
///
/// Listens on one address and serves exactly one connection.
#[derive(Debug)]
pub struct TcpReceiver {
    listener: TcpListener,
    idle_timeout: Option<Duration>,
}

impl TcpReceiver {
    pub async fn bind(addr: SocketAddr) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Receiver listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            idle_timeout: None,
        })
    }

    /// Bounds the wait for a connection and for each read.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the sender to connect.
    pub async fn accept(self) -> Result<(LineSource<TcpStream>, SocketAddr), LinkError> {
        let accept = self.listener.accept();
        let (stream, addr) = match self.idle_timeout {
            Some(timeout) => tokio::time::timeout(timeout, accept)
                .await
                .map_err(|_| LinkError::Timeout(timeout))??,
            None => accept.await?,
        };

        tracing::info!("Sender connected: {}", addr);
        let source = LineSource::new(stream).with_idle_timeout(self.idle_timeout);
        Ok((source, addr))
    }
}

/// In-memory sending end.
pub type MemorySink = LineSink<DuplexStream>;
/// In-memory receiving end.
pub type MemorySource = LineSource<DuplexStream>;

/// Returns a connected in-memory link.
pub fn memory_link() -> (MemorySink, MemorySource) {
    memory_link_with_capacity(DEFAULT_MEMORY_CAPACITY)
}

/// Like [`memory_link`], with a pipe buffer of `capacity` bytes.
pub fn memory_link_with_capacity(capacity: usize) -> (MemorySink, MemorySource) {
    let (tx, rx) = tokio::io::duplex(capacity);
    (LineSink::new(tx), LineSource::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkframe_codec::CodecError;

    #[test]
    fn test_encode_line() {
        let bits: Bits = "1001".parse().unwrap();
        assert_eq!(&encode_line(&bits)[..], b"1001\n");
        assert_eq!(&encode_line(&[])[..], b"\n");
    }

    #[test]
    fn test_line_decoder_splits_lines() {
        let mut decoder = LineDecoder::new();
        decoder.extend(b"0101\n11");
        assert_eq!(&decoder.decode_line().unwrap().unwrap()[..], b"0101");
        assert!(decoder.decode_line().unwrap().is_none());

        decoder.extend(b"0\n");
        assert_eq!(&decoder.decode_line().unwrap().unwrap()[..], b"110");
        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.take_remainder().is_none());
    }

    #[test]
    fn test_line_decoder_limits_length() {
        let mut decoder = LineDecoder::with_max_line_len(4);
        decoder.extend(b"010101");
        assert!(matches!(
            decoder.decode_line(),
            Err(LinkError::LineTooLong { max: 4 })
        ));
    }

    #[test]
    fn test_line_decoder_rejects_terminated_long_line() {
        let mut decoder = LineDecoder::with_max_line_len(4);
        decoder.extend(b"01010101\n0110\n");
        assert!(matches!(
            decoder.decode_line(),
            Err(LinkError::LineTooLong { max: 4 })
        ));
        assert_eq!(&decoder.decode_line().unwrap().unwrap()[..], b"0110");
        assert_eq!(decoder.buffered(), 0);
    }

    #[tokio::test]
    async fn test_memory_link_roundtrip() {
        let (mut sink, mut source) = memory_link();
        let a: Bits = "0011".parse().unwrap();
        let b: Bits = "1".parse().unwrap();

        sink.send_bits(&a).await.unwrap();
        sink.send_bits(&b).await.unwrap();
        sink.finish().await.unwrap();
        assert_eq!(sink.frames_sent(), 2);

        assert_eq!(source.receive_bits().await.unwrap(), Some(a));
        assert_eq!(source.receive_bits().await.unwrap(), Some(b));
        assert_eq!(source.receive_bits().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_finish_fails() {
        let (mut sink, _source) = memory_link();
        sink.finish().await.unwrap();
        let err = sink.send_bits(&Bits::zeros(1)).await.unwrap_err();
        assert!(matches!(err, LinkError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_source_usable() {
        let (tx, rx) = tokio::io::duplex(1024);
        let mut writer = tx;
        writer.write_all(b"01x1\n\n0110\r\n111").await.unwrap();
        drop(writer);

        let mut source = LineSource::new(rx);
        let err = source.receive_bits().await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::Codec(CodecError::InvalidEncoding { index: 2, .. })
        ));
        assert_eq!(
            source.receive_bits().await.unwrap().unwrap().to_string(),
            "0110"
        );
        // an unterminated last line is still delivered
        assert_eq!(
            source.receive_bits().await.unwrap().unwrap().to_string(),
            "111"
        );
        assert!(source.receive_bits().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let (_sink, source) = memory_link();
        let mut source = source.with_idle_timeout(Some(Duration::from_millis(20)));
        let err = source.receive_bits().await.unwrap_err();
        assert!(matches!(err, LinkError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_tcp_roundtrip() {
        let receiver = TcpReceiver::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = receiver.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut source, _) = receiver.accept().await.unwrap();
            let mut lines = Vec::new();
            while let Some(bits) = source.receive_bits().await.unwrap() {
                lines.push(bits.to_string());
            }
            lines
        });

        let mut sender = TcpSender::connect(addr, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(sender.peer_addr(), addr);
        sender.send_bits(&"1010".parse().unwrap()).await.unwrap();
        sender.send_bits(&"0001".parse().unwrap()).await.unwrap();
        sender.finish().await.unwrap();

        assert_eq!(server.await.unwrap(), vec!["1010", "0001"]);
    }

    #[tokio::test]
    async fn test_accept_timeout() {
        let receiver = TcpReceiver::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
            .with_idle_timeout(Some(Duration::from_millis(20)));
        assert!(matches!(
            receiver.accept().await,
            Err(LinkError::Timeout(_))
        ));
    }
}
