#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Declared or actual payload length is over the configured limit.
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// Field `index` cannot be rendered on the wire.
    #[error("field {index} rejected: {reason}")]
    InvalidField { index: usize, reason: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The peer closed the stream, possibly in the middle of a message.
    #[error("stream closed by peer")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
