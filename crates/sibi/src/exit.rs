use std::io;

use sibi_gateway::GatewayError;
use sibi_transport::TransportError;

// Process exit codes. 124 and 125 follow timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

/// A command failure carrying the exit code `main` should use.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::ConnectTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn gateway_error(context: &str, err: GatewayError) -> CliError {
    let code = match &err {
        GatewayError::HandshakeFailed(message) if message.starts_with("no reply") => TIMEOUT,
        GatewayError::RequestTimedOut(_) => TIMEOUT,
        GatewayError::HandshakeFailed(_) | GatewayError::Frame(_) | GatewayError::Codec(_) => {
            DATA_INVALID
        }
        GatewayError::Transport(_) => TRANSPORT_ERROR,
        GatewayError::ConnectionLost(_) | GatewayError::NotConnected => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_timeout_maps_to_124() {
        let err = GatewayError::HandshakeFailed("no reply within 1s".to_string());
        assert_eq!(gateway_error("probe failed", err).code, TIMEOUT);
    }

    #[test]
    fn malformed_handshake_is_invalid_data() {
        let err = GatewayError::HandshakeFailed("expected 2 fields".to_string());
        assert_eq!(gateway_error("probe failed", err).code, DATA_INVALID);
    }

    #[test]
    fn refused_connect_is_plain_failure() {
        let err = TransportError::Connect {
            addr: "localhost:7498".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let cli = transport_error("connect failed", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.starts_with("connect failed: "));
    }
}
