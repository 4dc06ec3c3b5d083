//! One persistent connection to a trading gateway, shared by many programs.
//!
//! sibi keeps a single framed TCP session to TWS / IB Gateway open,
//! correlates the replies to the requests that caused them, fans pushed
//! events out to subscribers, and reconnects when the session drops.
//!
//! # Crate Structure
//!
//! - [`transport`]: reaching the upstream gateway (`TcpConnector`)
//! - [`frame`]: length-prefixed, NUL-separated field framing
//! - [`gateway`]: the connection task, correlation and fan-out
//! - [`facade`]: JSON-lines access for downstream programs

/// Re-export transport types.
pub mod transport {
    pub use sibi_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sibi_frame::*;
}

/// Re-export gateway types.
pub mod gateway {
    pub use sibi_gateway::*;
}

pub mod facade;
