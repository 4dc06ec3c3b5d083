use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Every resolved address refused or failed; `source` is the last failure.
    #[error("cannot reach {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("no answer from {addr} within {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// DNS returned nothing for `host:port`.
    #[error("{0} did not resolve to any address")]
    Unresolved(String),

    /// Socket option or other I/O failure after the connection was made.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The connector can no longer hand out connections.
    #[error("connector closed")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
