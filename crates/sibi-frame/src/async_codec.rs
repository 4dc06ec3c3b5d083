use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_fields, split_fields, DEFAULT_MAX_PAYLOAD};
use crate::error::FrameError;
use crate::field::Field;

/// `tokio_util` codec for field frames.
///
/// Decodes into the split text fields of each message. Encodes either a list
/// of [`Field`]s as one frame, or raw [`Bytes`] verbatim for the connection
/// preamble that precedes all framed traffic.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    max_payload_size: usize,
}

impl FieldCodec {
    pub fn new() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Cap inbound payloads at `max_payload_size` bytes.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for FieldCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FieldCodec {
    type Item = Vec<String>;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = decode_frame(src, self.max_payload_size)?;
        Ok(frame.map(|frame| split_fields(&frame.payload)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(fields) => Ok(Some(fields)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Vec<Field>> for FieldCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Vec<Field>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_fields(&item, dst)
    }
}

impl Encoder<Bytes> for FieldCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
