//! # Framed Channel
//!
//! Length-prefixed message transport over a reliable byte stream. Every frame
//! is a 4-byte big-endian length followed by exactly that many payload bytes.
//! Payloads carry JSON.
//!
//! Partial reads and writes are normal on sockets and are retried until the
//! stream reports zero progress, which means the peer is gone.

use std::io::{ErrorKind, Read, Write};

use serde::Serialize;
use tracing::trace;

use crate::error::{GeneticError, Result};

/// Size of the frame header.
pub const HEADER_LEN: usize = 4;

/// Default upper limit for an incoming payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// A bidirectional framed channel over any `Read + Write` stream.
#[derive(Debug)]
pub struct FramedChannel<S> {
    stream: S,
    max_frame_len: usize,
}

impl<S: Read + Write> FramedChannel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Sets the largest payload `read_frame` accepts.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// `Encoding` if the payload does not fit the 32-bit length header,
    /// `ConnectionClosed` if the stream stops accepting bytes.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            GeneticError::Encoding(format!(
                "Payload of {} bytes does not fit a frame header",
                payload.len()
            ))
        })?;

        self.write_all(&len.to_be_bytes())?;
        self.write_all(payload)?;
        flush(&mut self.stream)?;
        trace!(bytes = payload.len(), "frame sent");
        Ok(())
    }

    /// Reads one frame and returns its payload.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the peer closes mid-frame, `FrameTooLarge` if the
    /// header announces more than the configured maximum.
    pub fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut header = [0u8; HEADER_LEN];
        self.read_exact(&mut header)?;
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_len {
            return Err(GeneticError::FrameTooLarge(len, self.max_frame_len));
        }

        let mut payload = vec![0u8; len];
        self.read_exact(&mut payload)?;
        trace!(bytes = len, "frame received");
        Ok(payload)
    }

    /// Serializes `value` to JSON and writes it as one frame.
    pub fn send<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.write_frame(&payload)
    }

    /// Reads one frame and parses it as a JSON value.
    pub fn receive_value(&mut self) -> Result<serde_json::Value> {
        let payload = self.read_frame()?;
        Ok(serde_json::from_slice(&payload)?)
    }

    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.stream.write(buf) {
                Ok(0) => return Err(GeneticError::ConnectionClosed),
                Ok(n) => buf = &buf[n..],
                Err(e) => map_io_error(e)?,
            }
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(GeneticError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(e) => map_io_error(e)?,
            }
        }
        Ok(())
    }
}

fn flush<S: Write>(stream: &mut S) -> Result<()> {
    loop {
        match stream.flush() {
            Ok(()) => return Ok(()),
            Err(e) => map_io_error(e)?,
        }
    }
}

/// `Ok(())` means "retry".
fn map_io_error(err: std::io::Error) -> Result<()> {
    match err.kind() {
        ErrorKind::Interrupted => Ok(()),
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Err(GeneticError::OracleTimeout),
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => Err(GeneticError::ConnectionClosed),
        _ => Err(GeneticError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory duplex stream that hands out at most `chunk` bytes per call.
    #[derive(Debug)]
    struct ChunkedStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        chunk: usize,
    }

    impl ChunkedStream {
        fn new(input: Vec<u8>, chunk: usize) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
                chunk,
            }
        }
    }

    impl Read for ChunkedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.input.read(&mut buf[..n])
        }
    }

    impl Write for ChunkedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.output.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ClosedWriter;

    impl Read for ClosedWriter {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for ClosedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_write_frame_layout() {
        let mut channel = FramedChannel::new(ChunkedStream::new(Vec::new(), 1));
        channel.write_frame(b"hello").unwrap();
        assert_eq!(channel.get_ref().output, frame(b"hello"));
    }

    #[test]
    fn test_chunked_matches_whole() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        for chunk in [1, 3, 4096, usize::MAX] {
            let mut channel = FramedChannel::new(ChunkedStream::new(frame(&payload), chunk));
            assert_eq!(channel.read_frame().unwrap(), payload);
            channel.write_frame(&payload).unwrap();
            assert_eq!(channel.into_inner().output, frame(&payload));
        }
    }

    #[test]
    fn test_empty_payload() {
        let mut channel = FramedChannel::new(ChunkedStream::new(frame(b""), 1));
        assert!(channel.read_frame().unwrap().is_empty());
    }

    #[test]
    fn test_eof_in_header_is_connection_closed() {
        let mut channel = FramedChannel::new(ChunkedStream::new(vec![0, 0], 1));
        assert!(matches!(
            channel.read_frame(),
            Err(GeneticError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_eof_in_payload_is_connection_closed() {
        let mut bytes = frame(b"truncated");
        bytes.truncate(8);
        let mut channel = FramedChannel::new(ChunkedStream::new(bytes, 2));
        assert!(matches!(
            channel.read_frame(),
            Err(GeneticError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_zero_progress_write_is_connection_closed() {
        let mut channel = FramedChannel::new(ClosedWriter);
        assert!(matches!(
            channel.write_frame(b"x"),
            Err(GeneticError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut channel =
            FramedChannel::new(ChunkedStream::new(frame(&[0u8; 64]), 64)).with_max_frame_len(16);
        assert!(matches!(
            channel.read_frame(),
            Err(GeneticError::FrameTooLarge(64, 16))
        ));
    }

    #[test]
    fn test_invalid_json_is_encoding_error() {
        let mut channel = FramedChannel::new(ChunkedStream::new(frame(b"{not json"), 7));
        assert!(matches!(
            channel.receive_value(),
            Err(GeneticError::Encoding(_))
        ));
    }
}
