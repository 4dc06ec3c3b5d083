use std::time::Duration;

use crate::codec::CodecError;

/// Errors surfaced by the gateway client.
///
/// This is also the failure type every pending request future completes with.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The request was issued while no upstream session was established.
    #[error("not connected to gateway")]
    NotConnected,

    /// An order-scoped request was issued before the server supplied the
    /// first valid order id.
    #[error("order id not yet assigned by server")]
    OrderIdUnavailable,

    /// The server rejected the request with an application error.
    #[error("api error {code} for id {id}: {message}")]
    Api { id: i64, code: i64, message: String },

    /// The connection dropped while the request was in flight.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// No terminal event arrived within the configured request timeout.
    #[error("request timed out after {0:?}")]
    RequestTimedOut(Duration),

    /// The gateway is shutting down.
    #[error("gateway shut down")]
    Shutdown,

    /// The server's handshake reply was malformed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A request with this id is already pending.
    #[error("id {0} already has a pending request")]
    DuplicateId(i64),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(String),

    /// The codec could not encode the call.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl GatewayError {
    /// Short stable tag, used by downstream facades to classify failures.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotConnected => "not_connected",
            GatewayError::OrderIdUnavailable => "order_id_unavailable",
            GatewayError::Api { .. } => "api",
            GatewayError::ConnectionLost(_) => "connection_lost",
            GatewayError::RequestTimedOut(_) => "timeout",
            GatewayError::Shutdown => "shutdown",
            GatewayError::HandshakeFailed(_) => "handshake",
            GatewayError::DuplicateId(_) => "duplicate_id",
            GatewayError::Transport(_) => "transport",
            GatewayError::Frame(_) => "frame",
            GatewayError::Codec(_) => "codec",
        }
    }
}

impl From<sibi_transport::TransportError> for GatewayError {
    fn from(err: sibi_transport::TransportError) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<sibi_frame::FrameError> for GatewayError {
    fn from(err: sibi_frame::FrameError) -> Self {
        GatewayError::Frame(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
