use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::field::Field;

/// Length prefix in front of every message: a big-endian `u32`.
pub const HEADER_SIZE: usize = 4;

/// Largest payload accepted unless configured otherwise (16 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One message as it came off the wire, length prefix removed.
#[derive(Debug, Clone)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    pub fn fields(&self) -> Vec<String> {
        split_fields(&self.payload)
    }
}

/// Append `payload` to `dst` behind its length prefix.
///
/// ```text
/// +---------------+------------------------------+
/// | len (u32, BE) | field \0 field \0 ... field \0 |
/// +---------------+------------------------------+
/// ```
///
/// The handshake version range is the one payload sent without a trailing
/// NUL; this function does not care either way.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Render `fields` as a payload, each one NUL-terminated.
///
/// Absent values and embedded NULs fail with [`FrameError::InvalidField`].
pub fn encode_payload(fields: &[Field]) -> Result<BytesMut> {
    let mut payload = BytesMut::with_capacity(fields.len() * 8);
    for (index, field) in fields.iter().enumerate() {
        field.write_to(index, &mut payload)?;
    }
    Ok(payload)
}

/// [`encode_payload`] followed by [`encode_frame`]. `dst` is untouched on error.
pub fn encode_fields(fields: &[Field], dst: &mut BytesMut) -> Result<()> {
    let payload = encode_payload(fields)?;
    encode_frame(&payload, dst)
}

/// Take one complete message off the front of `src`.
///
/// `Ok(None)` means more bytes are needed; `src` is left as it was apart
/// from reserving room for the rest of the message. The length check runs
/// as soon as the prefix is in, before any payload is buffered.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(prefix) = src.get(..HEADER_SIZE) else {
        return Ok(None);
    };
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    let needed = HEADER_SIZE + len;
    if src.len() < needed {
        src.reserve(needed - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(Frame {
        payload: src.split_to(len).freeze(),
    }))
}

/// Split a payload on NUL separators.
///
/// The terminator after the last field produces a trailing empty piece,
/// which is dropped. Invalid UTF-8 is replaced rather than rejected: the
/// framer does not own field semantics.
pub fn split_fields(payload: &[u8]) -> Vec<String> {
    let mut fields: Vec<String> = payload
        .split(|byte| *byte == 0)
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .collect();

    if fields.last().is_some_and(String::is_empty) {
        fields.pop();
    }
    fields
}

/// Limits and socket timeouts for the blocking reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub max_payload_size: usize,
    /// Applied to the socket by the `with_config_tcp` constructors.
    pub read_timeout: Option<std::time::Duration>,
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
