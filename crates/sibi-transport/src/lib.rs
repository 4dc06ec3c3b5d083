//! Transport layer for the upstream trading gateway.
//!
//! Provides the [`Connector`] seam the reconnecting supervisor dials through,
//! and the production [`TcpConnector`]. The blocking path
//! ([`TcpConnector::connect_blocking`]) serves one-shot probes that do not
//! run an async runtime.
//!
//! This is the lowest layer of sibi. Everything else builds on top of the
//! streams handed out here.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::TcpConnector;
pub use traits::Connector;
