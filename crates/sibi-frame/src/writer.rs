use std::io::{ErrorKind, Write};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, encode_payload, FrameConfig};
use crate::error::{FrameError, Result};
use crate::field::Field;

/// Blocking frame writer.
///
/// Each call encodes into a scratch buffer first and only touches the stream
/// once the whole message is known to be valid, so a rejected field never
/// leaves half a message on the wire. A socket write timeout surfaces as
/// `FrameError::Io`; after that the stream position is unknown and the
/// connection should be dropped.
pub struct FrameWriter<T> {
    inner: T,
    scratch: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(1024),
            config,
        }
    }

    /// Encode `fields` as one message and write it.
    pub fn send_fields(&mut self, fields: &[Field]) -> Result<()> {
        let payload = encode_payload(fields)?;
        self.send(&payload)
    }

    /// Prefix `payload` with its length and write it.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let max = self.config.max_payload_size;
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        self.scratch.clear();
        encode_frame(payload, &mut self.scratch)?;
        self.write_scratch()?;
        trace!(size = payload.len(), "frame written");
        Ok(())
    }

    /// Write `bytes` with no length prefix. Used for the connection preamble.
    pub fn send_unframed(&mut self, bytes: &[u8]) -> Result<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(bytes);
        self.write_scratch()
    }

    fn write_scratch(&mut self) -> Result<()> {
        let mut rest = &self.scratch[..];
        while !rest.is_empty() {
            match self.inner.write(rest) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => rest = &rest[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.inner.flush()?;
        Ok(())
    }
}

impl FrameWriter<TcpStream> {
    /// Writer over a socket, with the socket write timeout taken from `config`.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;

    fn messages(wire: &[u8]) -> Vec<Vec<String>> {
        let mut buf = BytesMut::from(wire);
        let mut out = Vec::new();
        while let Some(frame) = decode_frame(&mut buf, usize::MAX).unwrap() {
            out.push(frame.fields());
        }
        assert!(buf.is_empty(), "trailing bytes after last message");
        out
    }

    #[test]
    fn start_api_message_layout() {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire)
            .send_fields(&[Field::from(71), Field::from(2), Field::from(0), Field::empty()])
            .unwrap();

        assert_eq!(&wire[..4], &[0, 0, 0, 8]);
        assert_eq!(&wire[4..], b"71\x002\x000\x00\x00");
    }

    #[test]
    fn consecutive_messages() {
        let mut wire = Vec::new();
        let mut writer = FrameWriter::new(&mut wire);
        writer.send_fields(&[Field::from("8"), Field::from(true)]).unwrap();
        writer.send_fields(&[Field::from(2.5)]).unwrap();
        drop(writer);

        assert_eq!(messages(&wire), vec![vec!["8", "1"], vec!["2.5"]]);
    }

    #[test]
    fn preamble_then_version_range() {
        let mut wire = Vec::new();
        let mut writer = FrameWriter::new(&mut wire);
        writer.send_unframed(b"API\0").unwrap();
        writer.send(b"v100..176").unwrap();
        drop(writer);

        assert_eq!(&wire[..4], b"API\0");
        assert_eq!(&wire[4..8], &[0, 0, 0, 9]);
        assert_eq!(&wire[8..], b"v100..176");
    }

    #[test]
    fn invalid_field_writes_nothing() {
        let mut wire = Vec::new();
        let mut writer = FrameWriter::new(&mut wire);

        let err = writer
            .send_fields(&[Field::from(1), Field::from(None::<i64>)])
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidField { index: 1, .. }));

        let err = writer.send_fields(&[Field::from("a\0b")]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidField { index: 0, .. }));

        drop(writer);
        assert!(wire.is_empty());
    }

    #[test]
    fn payload_over_limit() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut wire = Vec::new();
        let err = FrameWriter::with_config(&mut wire, cfg)
            .send(b"oversized")
            .unwrap_err();

        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(wire.is_empty());
    }

    #[test]
    fn short_and_interrupted_writes_complete() {
        let mut sink = Stubborn::default();
        FrameWriter::new(&mut sink).send(b"retry\0").unwrap();

        assert_eq!(sink.interruptions, 1);
        assert_eq!(messages(&sink.data), vec![vec!["retry"]]);
    }

    #[test]
    fn write_timeout_is_an_error() {
        let mut sink = Stubborn {
            fail_with: Some(ErrorKind::WouldBlock),
            ..Stubborn::default()
        };
        let err = FrameWriter::new(&mut sink).send(b"x").unwrap_err();

        assert!(matches!(err, FrameError::Io(err) if err.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn zero_length_write_means_closed() {
        let err = FrameWriter::new(Closed).send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    /// Interrupts the first write, then accepts at most three bytes per call.
    #[derive(Default)]
    struct Stubborn {
        interruptions: usize,
        fail_with: Option<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for Stubborn {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.fail_with {
                return Err(kind.into());
            }
            if self.interruptions == 0 {
                self.interruptions += 1;
                return Err(ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
