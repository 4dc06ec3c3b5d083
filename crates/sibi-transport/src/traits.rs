use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Something that can open a fresh byte stream to the upstream gateway.
///
/// The supervisor calls [`Connector::connect`] once per connection attempt,
/// so implementations must be reusable across reconnects. Tests plug in
/// in-memory duplex streams here; production uses [`crate::TcpConnector`].
pub trait Connector: Send + Sync + 'static {
    /// The connected stream type.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream.
    fn connect(&self) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Human-readable endpoint, used in logs.
    fn endpoint(&self) -> String;
}
