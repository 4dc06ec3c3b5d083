//! Length-prefixed message framing for the trading gateway wire protocol.
//!
//! Every message on the wire is:
//! - A 4-byte big-endian payload length
//! - A payload made of text fields, each terminated by a single NUL byte
//!
//! The framer never interprets field contents. It only guarantees that
//! message and field boundaries survive arbitrary TCP chunking.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod field;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FieldCodec;
pub use codec::{
    decode_frame, encode_fields, encode_frame, encode_payload, split_fields, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use field::Field;
pub use reader::FrameReader;
pub use writer::FrameWriter;
