use std::io::{ErrorKind, Read};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Blocking frame reader.
///
/// Bytes left over after a complete message stay buffered for the next call,
/// so a read timeout on the underlying socket never loses data: the caller
/// sees `FrameError::Io` with `WouldBlock`/`TimedOut` and can simply retry.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            config,
        }
    }

    /// Block until one whole message is available.
    ///
    /// End of stream, whether between messages or inside one, is
    /// `FrameError::ConnectionClosed`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                trace!(size = frame.payload.len(), buffered = self.buf.len(), "frame read");
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// [`FrameReader::read_frame`], split into its text fields.
    pub fn read_fields(&mut self) -> Result<Vec<String>> {
        Ok(self.read_frame()?.fields())
    }

    /// Bytes received but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl FrameReader<TcpStream> {
    /// Reader over a socket, with the socket read timeout taken from `config`.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
